//! SFTP Endpoint
//!
//! ssh2 を使った SFTP エンドポイント

use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use log::{info, warn};
use ssh2::{Session, Sftp};

use super::retry::{calculate_retry_delay, is_connection_error, MAX_CONNECT_ATTEMPTS};
use crate::domain::errors::error_chain_to_string;
use crate::domain::repositories::remote_endpoint::{EndpointFactory, RemoteEndpoint, RemoteEntry};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// SFTP接続設定
#[derive(Debug, Clone)]
pub struct SftpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// `None` の場合はSSHエージェントで認証する
    pub password: Option<String>,
}

impl SftpSettings {
    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 認証済みのSFTPセッション1本
pub struct SftpEndpoint {
    // チャネルが生きている間はセッションを保持する
    _session: Session,
    sftp: Sftp,
}

impl SftpEndpoint {
    /// TCP接続、SSHハンドシェイク、SFTPサブシステムの開始までを行う
    pub fn connect(settings: &SftpSettings) -> Result<Self> {
        let addr = settings.address();
        let socket = addr
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve {}", addr))?
            .next()
            .with_context(|| format!("No address found for {}", addr))?;

        let tcp = TcpStream::connect_timeout(&socket, CONNECT_TIMEOUT)
            .with_context(|| format!("TCP connection to {} failed", addr))?;
        tcp.set_read_timeout(Some(IO_TIMEOUT))?;
        tcp.set_write_timeout(Some(IO_TIMEOUT))?;

        let mut session = Session::new().context("Failed to create SSH session")?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .with_context(|| format!("SSH handshake with {} failed", addr))?;

        match &settings.password {
            Some(password) => session.userauth_password(&settings.user, password),
            None => session.userauth_agent(&settings.user),
        }
        .with_context(|| format!("SSH authentication failed for {}@{}", settings.user, addr))?;

        if !session.authenticated() {
            anyhow::bail!("SSH authentication failed for {}@{}", settings.user, addr);
        }

        let sftp = session
            .sftp()
            .with_context(|| format!("Failed to start SFTP subsystem on {}", addr))?;

        Ok(Self {
            _session: session,
            sftp,
        })
    }

    /// `path` の親ディレクトリを作成する（`mkdir -p` 相当）
    fn ensure_parent_dirs(&self, path: &str) -> io::Result<()> {
        let Some(parent) = Path::new(path).parent() else {
            return Ok(());
        };

        let mut current = String::new();
        for part in parent.to_string_lossy().split('/') {
            if part.is_empty() {
                if current.is_empty() {
                    current.push('/');
                }
                continue;
            }
            if !current.ends_with('/') {
                current.push('/');
            }
            current.push_str(part);

            if self.sftp.stat(Path::new(&current)).is_err() {
                if let Err(e) = self.sftp.mkdir(Path::new(&current), 0o755) {
                    // 他のワーカーが先に作成した場合
                    if self.sftp.stat(Path::new(&current)).is_err() {
                        return Err(e.into());
                    }
                }
            }
        }
        Ok(())
    }
}

impl RemoteEndpoint for SftpEndpoint {
    fn list_directory(&self, path: &str) -> io::Result<Vec<RemoteEntry>> {
        let listing = self.sftp.readdir(Path::new(path))?;

        let mut entries: Vec<RemoteEntry> = listing
            .into_iter()
            .filter_map(|(entry_path, stat)| {
                let name = entry_path.file_name()?.to_string_lossy().into_owned();
                Some(RemoteEntry {
                    path: format!("{}/{}", path.trim_end_matches('/'), name),
                    name,
                    size: stat.size.unwrap_or(0),
                    modified_at: stat
                        .mtime
                        .and_then(|mtime| DateTime::from_timestamp(mtime as i64, 0)),
                    is_dir: stat.is_dir(),
                })
            })
            .collect();

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn create_and_write(&self, path: &str, source: &mut dyn Read) -> io::Result<u64> {
        self.ensure_parent_dirs(path)?;
        let mut remote = self.sftp.create(Path::new(path))?;
        io::copy(source, &mut remote)
    }

    fn open_for_read(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.sftp.open(Path::new(path))?))
    }
}

/// SFTPセッションのファクトリ
///
/// 接続エラーは指数バックオフで再試行する
pub struct SftpEndpointFactory {
    settings: SftpSettings,
}

impl SftpEndpointFactory {
    pub fn new(settings: SftpSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl EndpointFactory for SftpEndpointFactory {
    async fn connect(&self) -> Result<Box<dyn RemoteEndpoint>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let settings = self.settings.clone();
            let result = tokio::task::spawn_blocking(move || SftpEndpoint::connect(&settings))
                .await
                .map_err(|e| anyhow::anyhow!("Failed to spawn blocking task: {}", e))?;

            match result {
                Ok(endpoint) => {
                    info!(
                        target: "routesync::transfer",
                        "Connected to sftp://{}",
                        self.settings.address()
                    );
                    return Ok(Box::new(endpoint));
                }
                Err(e) => {
                    let error_msg = error_chain_to_string(&e);
                    if attempt >= MAX_CONNECT_ATTEMPTS || !is_connection_error(&error_msg) {
                        return Err(e.context(format!(
                            "Giving up on {} after {} attempt(s)",
                            self.settings.address(),
                            attempt
                        )));
                    }

                    let delay = calculate_retry_delay(attempt);
                    warn!(
                        target: "routesync::transfer",
                        "Connection attempt {}/{} failed: {}. Retrying in {}ms",
                        attempt,
                        MAX_CONNECT_ATTEMPTS,
                        error_msg,
                        delay
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("sftp://{}@{}", self.settings.user, self.settings.address())
    }
}
