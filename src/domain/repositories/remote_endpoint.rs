//! # Remote Endpoint Trait
//!
//! 転送先エンドポイントの最小限の操作を抽象化
//!
//! プロトコルやセッションの詳細は Adapter 層に閉じ込める。
//! 操作はブロッキングI/Oで、呼び出し側が `spawn_blocking` 上で実行する。

use std::io::{self, Read};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// リモートディレクトリのエントリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub is_dir: bool,
}

/// リモートエンドポイント（1接続）
///
/// 1つの接続を同時に2つの転送で使ってはならない。
/// 並行転送では接続をワーカーごとに払い出す。
pub trait RemoteEndpoint: Send {
    /// ディレクトリ直下のエントリを列挙
    fn list_directory(&self, path: &str) -> io::Result<Vec<RemoteEntry>>;

    /// 転送先を作成（既存なら切り詰め）して `source` の内容を書き込む
    ///
    /// 親ディレクトリがなければ作成する
    ///
    /// # Returns
    ///
    /// 書き込んだバイト数
    fn create_and_write(&self, path: &str, source: &mut dyn Read) -> io::Result<u64>;

    /// リモートファイルを読み込み用に開く
    fn open_for_read(&self, path: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// Factory for opening endpoint connections
#[async_trait]
pub trait EndpointFactory: Send + Sync {
    /// 新しい接続を開く
    async fn connect(&self) -> Result<Box<dyn RemoteEndpoint>>;

    /// ログ表示用の接続先
    fn describe(&self) -> String;
}
