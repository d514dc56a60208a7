//! # Sync Errors
//!
//! 同期エンジンのエラー分類
//!
//! | 種類 | 扱い |
//! |---|---|
//! | `Discovery` / `LedgerQuery` | 致命的（実行を中断） |
//! | `LedgerWrite` / `Transfer` / `Endpoint` | ファイル単位（バッチは継続） |
//! | `ClassificationMiss` / `DateParseMiss` / `DateBeforeCutoff` | 除外理由（エラーではない） |

use chrono::NaiveDate;
use thiserror::Error;

/// 同期エンジンのエラー
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("failed to list source location {location}: {reason}")]
    Discovery { location: String, reason: String },

    #[error("failed to query transfer ledger for {file_name}: {reason}")]
    LedgerQuery { file_name: String, reason: String },

    #[error("transferred {file_name} but failed to record it in the ledger: {reason}")]
    LedgerWrite { file_name: String, reason: String },

    #[error("{file_name} matches no naming rule")]
    ClassificationMiss { file_name: String },

    #[error("{file_name} carries no parseable date")]
    DateParseMiss { file_name: String },

    #[error("{file_name} is dated {date}, not after cutoff {cutoff}")]
    DateBeforeCutoff {
        file_name: String,
        date: NaiveDate,
        cutoff: NaiveDate,
    },

    #[error("failed to transfer {file_name} to {destination}")]
    Transfer {
        file_name: String,
        destination: String,
        #[source]
        source: std::io::Error,
    },

    #[error("remote endpoint unavailable: {reason}")]
    Endpoint { reason: String },

    #[error("invalid configuration: {field} - {reason}")]
    Configuration { field: String, reason: String },
}

impl SyncError {
    /// 実行全体を中断すべきエラーかどうか
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Discovery { .. }
                | SyncError::LedgerQuery { .. }
                | SyncError::Configuration { .. }
        )
    }

    /// 日付ゲートによる除外かどうか
    pub fn is_date_exclusion(&self) -> bool {
        matches!(
            self,
            SyncError::DateParseMiss { .. } | SyncError::DateBeforeCutoff { .. }
        )
    }
}

/// エラーチェーンから致命的な `SyncError` を探す
pub fn fatal_cause(e: &anyhow::Error) -> Option<&SyncError> {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<SyncError>())
        .filter(|err| err.is_fatal())
}

/// Convert error chain to string including all causes
pub fn error_chain_to_string(e: &anyhow::Error) -> String {
    let mut messages = Vec::new();
    for cause in e.chain() {
        messages.push(cause.to_string());
    }
    messages.join(" | ")
}

/// `std::error::Error` の source チェーンを1行にまとめる
pub fn error_sources_to_string(e: &(dyn std::error::Error + 'static)) -> String {
    let mut messages = vec![e.to_string()];
    let mut current = e.source();
    while let Some(cause) = current {
        messages.push(cause.to_string());
        current = cause.source();
    }
    messages.join(" | ")
}
