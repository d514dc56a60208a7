//! # Record Outcomes Use Case
//!
//! 転送結果を台帳に記録し、実行結果を集計するユースケース

use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::mpsc;

use crate::domain::entities::ledger_entry::LedgerEntry;
use crate::domain::entities::routed_file::{DestinationClass, RoutedFile};
use crate::domain::entities::run_summary::RunSummary;
use crate::domain::entities::transfer_outcome::{ClassReport, LedgerAnomaly, TransferOutcome};
use crate::domain::errors::{error_chain_to_string, error_sources_to_string, SyncError};
use crate::domain::repositories::ledger_repository::LedgerRepository;

/// 結果記録ユースケース
///
/// 成功した転送は届いた順にすぐ台帳へ記録する。失敗は診断を出すだけで再試行しない。
pub struct RecordOutcomesUseCase<L: LedgerRepository + ?Sized> {
    ledger: Arc<L>,
}

impl<L: LedgerRepository + ?Sized> RecordOutcomesUseCase<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// 成功した転送を台帳に記録する
    ///
    /// # Errors
    ///
    /// 書き込みに失敗した場合に `SyncError::LedgerWrite` を返す。
    /// 転送自体は取り消さない。
    pub async fn record_success(&self, file: &RoutedFile) -> Result<(), SyncError> {
        let entry = LedgerEntry::for_transfer(file, Utc::now());
        self.ledger
            .record(&entry)
            .await
            .map_err(|e| SyncError::LedgerWrite {
                file_name: file.name().to_string(),
                reason: error_chain_to_string(&e),
            })
    }

    /// チャネルが閉じるまで転送結果を受け取り、クラス単位の結果を返す
    pub async fn consume(
        &self,
        class: DestinationClass,
        mut outcomes: mpsc::Receiver<TransferOutcome>,
    ) -> ClassReport {
        let mut report = ClassReport::new(class);

        while let Some(outcome) = outcomes.recv().await {
            match &outcome {
                TransferOutcome::Succeeded(done) => {
                    if let Err(error) = self.record_success(&done.file).await {
                        error!(target: "routesync::ledger", "[LEDGER/FAILED] {}", error);
                        report.ledger_anomalies.push(LedgerAnomaly {
                            file: done.file.clone(),
                            error,
                        });
                    }
                }
                TransferOutcome::Failed(failed) => {
                    warn!(
                        target: "routesync::summary",
                        "[{}/FAILED] {}",
                        class,
                        error_sources_to_string(&failed.error)
                    );
                }
                TransferOutcome::Skipped(_) => {}
            }
            report.transfers.push(outcome);
        }

        info!(
            target: "routesync::summary",
            "[{}/END] succeeded={} failed={} skipped={} ledger_anomalies={}",
            class,
            report.transfers.succeeded.len(),
            report.transfers.failed.len(),
            report.transfers.skipped.len(),
            report.ledger_anomalies.len()
        );

        report
    }
}

/// 実行全体の集計をログに出す
pub fn emit_summary(summary: &RunSummary) {
    info!(
        target: "routesync::summary",
        "[SUMMARY] discovered={} already_done={} routed={} (bank={} secondary={}) \
         unmatched={} excluded_by_date={}",
        summary.discovered,
        summary.already_done,
        summary.routed(),
        summary.routed_bank,
        summary.routed_secondary,
        summary.excluded_unmatched,
        summary.excluded_date
    );

    let line = format!(
        "[SUMMARY] succeeded={} failed={} skipped={} ledger_anomalies={} bytes={}",
        summary.succeeded,
        summary.failed,
        summary.skipped,
        summary.ledger_anomalies,
        summary.bytes_transferred
    );
    if summary.has_failures() {
        warn!(target: "routesync::summary", "{}", line);
    } else {
        info!(target: "routesync::summary", "{}", line);
    }
}
