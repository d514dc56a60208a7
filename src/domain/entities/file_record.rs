//! # FileRecord Entity
//!
//! 発見されたファイルのドメインエンティティ

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ソースの種類
///
/// ローカルファイルシステムか、転送先エンドポイント上のリモートディレクトリか
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Local,
    Remote,
}

/// ソースロケーション
///
/// 発見対象のディレクトリ（1階層のみ走査する）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: String,
    #[serde(default)]
    pub kind: SourceKind,
}

impl SourceLocation {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: SourceKind::Local,
        }
    }

    pub fn remote(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: SourceKind::Remote,
        }
    }
}

/// 発見されたファイル
///
/// ファイル名が重複排除と分類の識別キーになる。
/// サイズと更新日時は情報表示用で、重複排除には使わない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub source_location: String,
    pub source_kind: SourceKind,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// 新しいファイルレコードを作成
    ///
    /// # Arguments
    ///
    /// * `name` - ベースファイル名
    /// * `source_location` - ソースのフルパス
    /// * `source_kind` - ローカルかリモートか
    ///
    /// # Errors
    ///
    /// ファイル名またはソースパスが空の場合にエラーを返す
    pub fn new(
        name: impl Into<String>,
        source_location: impl Into<String>,
        source_kind: SourceKind,
    ) -> anyhow::Result<Self> {
        let name = name.into();
        let source_location = source_location.into();

        if name.is_empty() {
            anyhow::bail!("File name cannot be empty");
        }
        if source_location.is_empty() {
            anyhow::bail!("Source location cannot be empty for {}", name);
        }

        Ok(Self {
            name,
            source_location,
            source_kind,
            size: 0,
            modified_at: None,
        })
    }

    /// メタデータを付与
    pub fn with_metadata(mut self, size: u64, modified_at: Option<DateTime<Utc>>) -> Self {
        self.size = size;
        self.modified_at = modified_at;
        self
    }
}
