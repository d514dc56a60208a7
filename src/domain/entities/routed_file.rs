//! # RoutedFile Entity
//!
//! 分類済みファイル（転送先パス付き）

use std::fmt;

use super::file_record::FileRecord;

/// 転送先クラス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DestinationClass {
    Bank,
    Secondary,
    Unmatched,
}

impl DestinationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationClass::Bank => "bank",
            DestinationClass::Secondary => "secondary",
            DestinationClass::Unmatched => "unmatched",
        }
    }
}

impl fmt::Display for DestinationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// リモートパスを `/` で結合する
///
/// 空のセグメントは無視し、先頭セグメントの先頭 `/` のみ保持する
pub fn join_remote_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut joined = String::new();

    for segment in segments {
        let segment = segment.as_ref();
        let trimmed = segment.trim_matches('/');

        if joined.is_empty() {
            if segment.starts_with('/') {
                joined.push('/');
            }
            joined.push_str(trimmed);
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }
        if !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(trimmed);
    }

    joined
}

/// 分類済みファイル
///
/// 転送先パスは生成時に一度だけ計算され、以後変更されない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedFile {
    file: FileRecord,
    destination_class: DestinationClass,
    destination_dir: String,
    destination_path: String,
}

impl RoutedFile {
    /// 新しい分類済みファイルを作成
    ///
    /// # Errors
    ///
    /// 転送先ディレクトリが空の場合、またはクラスが `Unmatched` の場合にエラーを返す
    pub fn new(
        file: FileRecord,
        destination_class: DestinationClass,
        destination_dir: String,
    ) -> anyhow::Result<Self> {
        if destination_class == DestinationClass::Unmatched {
            anyhow::bail!("{} has no destination class", file.name);
        }
        if destination_dir.trim_matches('/').is_empty() {
            anyhow::bail!("Destination directory cannot be empty for {}", file.name);
        }

        let destination_path = join_remote_path(&[destination_dir.as_str(), file.name.as_str()]);

        Ok(Self {
            file,
            destination_class,
            destination_dir,
            destination_path,
        })
    }

    pub fn file(&self) -> &FileRecord {
        &self.file
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn source_location(&self) -> &str {
        &self.file.source_location
    }

    pub fn destination_class(&self) -> DestinationClass {
        self.destination_class
    }

    pub fn destination_dir(&self) -> &str {
        &self.destination_dir
    }

    pub fn destination_path(&self) -> &str {
        &self.destination_path
    }
}
