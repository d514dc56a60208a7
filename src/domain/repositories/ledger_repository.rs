//! # Ledger Repository Trait
//!
//! 転送台帳の永続化を抽象化

use anyhow::Result;
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::domain::entities::ledger_entry::LedgerEntry;

/// 台帳リポジトリ
///
/// 「このファイルは転送済みか」の唯一の情報源。
/// 実装は各呼び出しを他の呼び出しに対してアトミックにしなければならない
/// （並行するワーカーから `record` が同時に呼ばれる）。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// ファイル名のエントリが1件以上あるかを確認
    ///
    /// # Errors
    ///
    /// ストレージが読めない場合にエラーを返す。
    /// 読めない台帳を「未転送」とみなしてはならない。
    async fn is_transferred(&self, file_name: &str) -> Result<bool>;

    /// エントリを追記する
    ///
    /// # Errors
    ///
    /// 書き込みに失敗した場合にエラーを返す
    async fn record(&self, entry: &LedgerEntry) -> Result<()>;

    /// 記録済みエントリ数
    async fn count(&self) -> Result<u64>;
}
