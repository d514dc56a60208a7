//! Local Directory Endpoint
//!
//! 転送先パスをローカルディレクトリ配下に対応付けるエンドポイント（ステージング・テスト用）

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::repositories::remote_endpoint::{EndpointFactory, RemoteEndpoint, RemoteEntry};

/// ローカルディレクトリをルートとするエンドポイント
pub struct LocalEndpoint {
    root: PathBuf,
}

impl LocalEndpoint {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// リモートパス（`/a/b`）をルート配下のパスに変換
    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        for component in relative.components() {
            if !matches!(component, Component::Normal(_) | Component::CurDir) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path escapes endpoint root: {}", path),
                ));
            }
        }
        Ok(self.root.join(relative))
    }
}

impl RemoteEndpoint for LocalEndpoint {
    fn list_directory(&self, path: &str) -> io::Result<Vec<RemoteEntry>> {
        let dir = self.resolve(path)?;
        let mut entries = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(RemoteEntry {
                path: format!("{}/{}", path.trim_end_matches('/'), name),
                name,
                size: metadata.len(),
                modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
                is_dir: metadata.is_dir(),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn create_and_write(&self, path: &str, source: &mut dyn Read) -> io::Result<u64> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(&target)?);
        let bytes = io::copy(source, &mut writer)?;
        writer.flush()?;
        Ok(bytes)
    }

    fn open_for_read(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(self.resolve(path)?)?))
    }
}

/// [`LocalEndpoint`] のファクトリ
pub struct LocalEndpointFactory {
    root: PathBuf,
}

impl LocalEndpointFactory {
    pub fn new(root: &str) -> Self {
        let expanded = shellexpand::tilde(root);
        Self {
            root: PathBuf::from(expanded.as_ref()),
        }
    }
}

#[async_trait]
impl EndpointFactory for LocalEndpointFactory {
    async fn connect(&self) -> Result<Box<dyn RemoteEndpoint>> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create endpoint root {}", self.root.display()))?;
        Ok(Box::new(LocalEndpoint::new(self.root.clone())))
    }

    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }
}
