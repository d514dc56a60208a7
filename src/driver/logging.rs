//! Logger Setup
//!
//! env_logger の初期化（標準エラー出力と、指定があればログファイルへの追記）

use std::fs::{File, OpenOptions};
use std::io::{self, Write};

use anyhow::{Context, Result};

/// 2つの出力先に同じ内容を書き込む
pub struct TeeWriter<A, B> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> TeeWriter<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Write, B: Write> Write for TeeWriter<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}

/// ログファイルを追記モードで開く（なければ作成）
pub fn open_log_file(path: &str) -> Result<File> {
    let expanded = shellexpand::tilde(path);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(expanded.as_ref())
        .with_context(|| format!("Failed to open log file {}", path))
}

/// ロガーを初期化する
///
/// フィルタの既定値は `info`（`RUST_LOG` で上書き可能）。
/// `log_file` を指定すると標準エラー出力とファイルの両方に書き込む
pub fn init_logger(log_file: Option<&str>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(path) = log_file {
        let file = open_log_file(path)?;
        builder
            .write_style(env_logger::WriteStyle::Never)
            .target(env_logger::Target::Pipe(Box::new(TeeWriter::new(
                io::stderr(),
                file,
            ))));
    }

    builder.try_init().context("Failed to initialize logger")?;
    Ok(())
}
