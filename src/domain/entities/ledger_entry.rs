//! # LedgerEntry Entity
//!
//! 転送台帳のエントリ

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::routed_file::RoutedFile;

/// 転送完了記録
///
/// 転送成功ごとに一度だけ作成され、エンジンからは更新も削除もされない。
/// 同じファイル名で2件目が追加されても統合はせず、そのまま追記する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub file_name: String,
    pub source_path: String,
    pub destination_path: String,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        file_name: impl Into<String>,
        source_path: impl Into<String>,
        destination_path: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            source_path: source_path.into(),
            destination_path: destination_path.into(),
            timestamp,
        }
    }

    /// 転送済みファイルから台帳エントリを作成
    pub fn for_transfer(file: &RoutedFile, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            file.name(),
            file.source_location(),
            file.destination_path(),
            timestamp,
        )
    }
}
