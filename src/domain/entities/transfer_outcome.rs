//! # Transfer Outcome
//!
//! ファイル単位の転送結果と、クラス単位の集計

use super::routed_file::{DestinationClass, RoutedFile};
use crate::domain::errors::SyncError;

/// 転送に成功したファイル
#[derive(Debug)]
pub struct TransferredFile {
    pub file: RoutedFile,
    pub bytes: u64,
}

/// 転送に失敗したファイル（元のエラーを保持）
#[derive(Debug)]
pub struct FailedTransfer {
    pub file: RoutedFile,
    pub error: SyncError,
}

/// 転送済みだが台帳に記録できなかったファイル
#[derive(Debug)]
pub struct LedgerAnomaly {
    pub file: RoutedFile,
    pub error: SyncError,
}

/// ファイル単位の転送結果
///
/// `Pending -> InFlight -> {Succeeded, Failed}`。
/// キャンセルにより開始されなかったファイルは `Skipped`。
#[derive(Debug)]
pub enum TransferOutcome {
    Succeeded(TransferredFile),
    Failed(FailedTransfer),
    Skipped(RoutedFile),
}

impl TransferOutcome {
    pub fn file(&self) -> &RoutedFile {
        match self {
            TransferOutcome::Succeeded(done) => &done.file,
            TransferOutcome::Failed(failed) => &failed.file,
            TransferOutcome::Skipped(file) => file,
        }
    }
}

/// グループ全体の転送結果（成功・失敗・スキップに分割）
#[derive(Debug, Default)]
pub struct TransferReport {
    pub succeeded: Vec<TransferredFile>,
    pub failed: Vec<FailedTransfer>,
    pub skipped: Vec<RoutedFile>,
}

impl TransferReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: TransferOutcome) {
        match outcome {
            TransferOutcome::Succeeded(done) => self.succeeded.push(done),
            TransferOutcome::Failed(failed) => self.failed.push(failed),
            TransferOutcome::Skipped(file) => self.skipped.push(file),
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.succeeded.iter().map(|done| done.bytes).sum()
    }

    /// 全ファイルが成功したかチェックします。
    ///
    /// ```
    /// use routesync::domain::entities::transfer_outcome::TransferReport;
    ///
    /// let report = TransferReport::new();
    /// assert!(report.is_success());
    /// ```
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// クラス単位の結果（転送結果＋台帳記録の異常）
#[derive(Debug)]
pub struct ClassReport {
    pub class: DestinationClass,
    pub transfers: TransferReport,
    pub ledger_anomalies: Vec<LedgerAnomaly>,
}

impl ClassReport {
    pub fn new(class: DestinationClass) -> Self {
        Self {
            class,
            transfers: TransferReport::new(),
            ledger_anomalies: Vec::new(),
        }
    }
}
