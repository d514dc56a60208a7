//! # Filter Transferred Use Case
//!
//! 台帳に記録済みのファイルを除外するユースケース

use std::sync::Arc;

use anyhow::Result;
use log::{debug, error, info};

use crate::domain::entities::file_record::FileRecord;
use crate::domain::errors::{error_chain_to_string, SyncError};
use crate::domain::repositories::ledger_repository::LedgerRepository;

/// 台帳フィルタの結果
#[derive(Debug, Default)]
pub struct FilterResult {
    /// 未転送のファイル（分類へ進む）
    pub pending: Vec<FileRecord>,
    /// 台帳で転送済みと判定されたファイル数
    pub already_done: usize,
}

/// 転送済みファイル除外ユースケース
///
/// 発見された各ファイルについて台帳を1件ずつ問い合わせ、
/// `is_transferred` が `false` のものだけを残す
pub struct FilterTransferredUseCase<L: LedgerRepository + ?Sized> {
    ledger: Arc<L>,
}

impl<L: LedgerRepository + ?Sized> FilterTransferredUseCase<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// 転送済みファイルを除外する
    ///
    /// # Errors
    ///
    /// 台帳を読めない場合に `SyncError::LedgerQuery` を返す（致命的）
    pub async fn execute(&self, files: Vec<FileRecord>) -> Result<FilterResult> {
        let mut result = FilterResult::default();

        for file in files {
            match self.ledger.is_transferred(&file.name).await {
                Ok(true) => {
                    debug!(target: "routesync::ledger", "[LEDGER/DONE] {}", file.name);
                    result.already_done += 1;
                }
                Ok(false) => result.pending.push(file),
                Err(e) => {
                    let reason = error_chain_to_string(&e);
                    error!(
                        target: "routesync::ledger",
                        "[LEDGER/FAILED] Lookup for {}: {}", file.name, reason
                    );
                    return Err(SyncError::LedgerQuery {
                        file_name: file.name,
                        reason,
                    }
                    .into());
                }
            }
        }

        info!(
            target: "routesync::ledger",
            "[LEDGER/FILTER] {} pending, {} already transferred",
            result.pending.len(),
            result.already_done
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::file_record::SourceKind;
    use crate::domain::repositories::ledger_repository::MockLedgerRepository;
    use mockall::predicate::eq;

    fn record(name: &str) -> FileRecord {
        FileRecord::new(name, format!("/data/{}", name), SourceKind::Local).unwrap()
    }

    #[tokio::test]
    async fn test_filter_keeps_only_untransferred() {
        let mut ledger = MockLedgerRepository::new();
        ledger
            .expect_is_transferred()
            .with(eq("A.txt"))
            .times(1)
            .returning(|_| Ok(true));
        ledger
            .expect_is_transferred()
            .with(eq("B.txt"))
            .times(1)
            .returning(|_| Ok(false));

        let use_case = FilterTransferredUseCase::new(Arc::new(ledger));
        let result = use_case
            .execute(vec![record("A.txt"), record("B.txt")])
            .await
            .unwrap();

        assert_eq!(result.already_done, 1);
        assert_eq!(result.pending.len(), 1);
        assert_eq!(result.pending[0].name, "B.txt");
    }

    #[tokio::test]
    async fn test_filter_empty_input_skips_ledger() {
        let mut ledger = MockLedgerRepository::new();
        ledger.expect_is_transferred().never();

        let use_case = FilterTransferredUseCase::new(Arc::new(ledger));
        let result = use_case.execute(vec![]).await.unwrap();

        assert!(result.pending.is_empty());
        assert_eq!(result.already_done, 0);
    }

    #[tokio::test]
    async fn test_unreadable_ledger_is_fatal() {
        let mut ledger = MockLedgerRepository::new();
        ledger
            .expect_is_transferred()
            .returning(|_| Err(anyhow::anyhow!("database is locked")));

        let use_case = FilterTransferredUseCase::new(Arc::new(ledger));
        let err = use_case.execute(vec![record("A.txt")]).await.unwrap_err();

        let sync_error = err.downcast_ref::<SyncError>().unwrap();
        assert!(sync_error.is_fatal());
        assert!(sync_error.to_string().contains("database is locked"));
    }
}
