//! # RunSummary Value Object
//!
//! 1回の実行の集計カウンタ

use serde::Serialize;

use super::transfer_outcome::ClassReport;

/// 正常終了
pub const EXIT_SUCCESS: u8 = 0;
/// 致命的エラーで中断
pub const EXIT_FATAL: u8 = 1;
/// 転送失敗・台帳記録の異常・キャンセルが残ったまま終了
pub const EXIT_PARTIAL_FAILURE: u8 = 2;

/// 実行サマリー
///
/// 発見された全ファイルは「台帳で転送済み」「ルーティング済み」
/// 「除外（規則不一致）」「除外（日付）」のいずれか1つに必ず数えられる
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub discovered: usize,
    pub already_done: usize,
    pub routed_bank: usize,
    pub routed_secondary: usize,
    pub excluded_unmatched: usize,
    pub excluded_date: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub ledger_anomalies: usize,
    pub bytes_transferred: u64,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routed(&self) -> usize {
        self.routed_bank + self.routed_secondary
    }

    pub fn excluded(&self) -> usize {
        self.excluded_unmatched + self.excluded_date
    }

    /// クラス単位の結果を集計に加える
    pub fn absorb(&mut self, report: &ClassReport) {
        self.succeeded += report.transfers.succeeded.len();
        self.failed += report.transfers.failed.len();
        self.skipped += report.transfers.skipped.len();
        self.ledger_anomalies += report.ledger_anomalies.len();
        self.bytes_transferred += report.transfers.bytes_transferred();
    }

    /// 未解決のファイル単位の問題が残っているか
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.skipped > 0 || self.ledger_anomalies > 0
    }

    /// プロセスの終了コード
    ///
    /// 致命的エラーはこのサマリーが作られる前に `Err` として伝播するため、ここでは扱わない
    pub fn exit_code(&self, fail_on_transfer_error: bool) -> u8 {
        if fail_on_transfer_error && self.has_failures() {
            EXIT_PARTIAL_FAILURE
        } else {
            EXIT_SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::file_record::{FileRecord, SourceKind};
    use crate::domain::entities::routed_file::{DestinationClass, RoutedFile};
    use crate::domain::entities::transfer_outcome::{
        FailedTransfer, LedgerAnomaly, TransferOutcome, TransferredFile,
    };
    use crate::domain::errors::SyncError;

    fn routed(name: &str) -> RoutedFile {
        let record = FileRecord::new(name, format!("/in/{}", name), SourceKind::Local).unwrap();
        RoutedFile::new(record, DestinationClass::Bank, "/out".to_string()).unwrap()
    }

    #[test]
    fn test_absorb_class_report() {
        let mut report = ClassReport::new(DestinationClass::Bank);
        report.transfers.push(TransferOutcome::Succeeded(TransferredFile {
            file: routed("A"),
            bytes: 100,
        }));
        report.transfers.push(TransferOutcome::Failed(FailedTransfer {
            file: routed("B"),
            error: SyncError::Endpoint {
                reason: "timeout".to_string(),
            },
        }));
        report.ledger_anomalies.push(LedgerAnomaly {
            file: routed("A"),
            error: SyncError::LedgerWrite {
                file_name: "A".to_string(),
                reason: "disk full".to_string(),
            },
        });

        let mut summary = RunSummary::new();
        summary.absorb(&report);

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.ledger_anomalies, 1);
        assert_eq!(summary.bytes_transferred, 100);
    }

    #[test]
    fn test_routed_and_excluded_totals() {
        let summary = RunSummary {
            routed_bank: 3,
            routed_secondary: 2,
            excluded_unmatched: 4,
            excluded_date: 1,
            ..RunSummary::default()
        };

        assert_eq!(summary.routed(), 5);
        assert_eq!(summary.excluded(), 5);
    }

    #[test]
    fn test_exit_code() {
        let clean = RunSummary {
            succeeded: 3,
            ..RunSummary::default()
        };
        assert_eq!(clean.exit_code(true), EXIT_SUCCESS);

        let failed = RunSummary {
            succeeded: 2,
            failed: 1,
            ..RunSummary::default()
        };
        assert_eq!(failed.exit_code(true), EXIT_PARTIAL_FAILURE);
        assert_eq!(failed.exit_code(false), EXIT_SUCCESS);

        let cancelled = RunSummary {
            skipped: 4,
            ..RunSummary::default()
        };
        assert_eq!(cancelled.exit_code(true), EXIT_PARTIAL_FAILURE);
    }
}
