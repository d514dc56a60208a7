//! # Source Repository Trait
//!
//! ソースロケーションの一覧取得を抽象化

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::entities::file_record::{FileRecord, SourceLocation};

/// ソースリポジトリ
///
/// ソースロケーション直下（1階層のみ）のファイルを列挙する
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// ロケーション直下のファイルを列挙する
    ///
    /// # Arguments
    ///
    /// * `location` - ソースロケーション
    ///
    /// # Returns
    ///
    /// ディレクトリ以外のエントリのファイルレコード
    ///
    /// # Errors
    ///
    /// ロケーションが存在しない、権限がない、転送路が使えない場合にエラーを返す。
    /// 空の一覧で代用してはならない。
    async fn list_files(&self, location: &SourceLocation) -> Result<Vec<FileRecord>>;
}
