//! Workflow Orchestration
//!
//! ワークフローのオーケストレーション
//!
//! 発見 → 台帳フィルタ → 分類 → クラスごとの並行転送 → 結果記録

use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::adapter::config::{Config, LedgerBackend};
use crate::adapter::endpoint::build_factory;
use crate::adapter::repositories::file_source_repository::FileSourceRepository;
use crate::adapter::repositories::json_ledger_repository::JsonLedgerRepository;
use crate::adapter::repositories::sqlite_ledger_repository::SqliteLedgerRepository;
use crate::application::dto::sync_config::SyncConfig;
use crate::application::use_cases::discover_files::DiscoverFilesUseCase;
use crate::application::use_cases::filter_transferred::FilterTransferredUseCase;
use crate::application::use_cases::record_outcomes::{emit_summary, RecordOutcomesUseCase};
use crate::application::use_cases::route_files::RouteFilesUseCase;
use crate::application::use_cases::transfer_files::TransferFilesUseCase;
use crate::domain::entities::routed_file::{DestinationClass, RoutedFile};
use crate::domain::entities::run_summary::RunSummary;
use crate::domain::entities::transfer_outcome::ClassReport;
use crate::domain::errors::error_sources_to_string;
use crate::domain::repositories::ledger_repository::LedgerRepository;
use crate::domain::repositories::remote_endpoint::EndpointFactory;
use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::services::classifier::Classifier;

/// File Sync Workflow
pub struct FileSyncWorkflow {
    config: SyncConfig,
    ledger: Arc<dyn LedgerRepository>,
    endpoint_factory: Arc<dyn EndpointFactory>,
    discover_use_case: DiscoverFilesUseCase<dyn SourceRepository>,
    filter_use_case: FilterTransferredUseCase<dyn LedgerRepository>,
    route_use_case: RouteFilesUseCase,
    record_use_case: RecordOutcomesUseCase<dyn LedgerRepository>,
}

impl FileSyncWorkflow {
    /// Create a new workflow instance from the loaded configuration
    ///
    /// # Errors
    ///
    /// 台帳を開けない場合、または命名規則が不正な場合にエラーを返す
    pub fn new(config: &Config, dry_run: bool) -> Result<Self> {
        let endpoint_factory = build_factory(&config.endpoint);

        let ledger: Arc<dyn LedgerRepository> = match config.ledger.backend {
            LedgerBackend::Sqlite => Arc::new(SqliteLedgerRepository::open(&config.ledger.path)?),
            LedgerBackend::Json => Arc::new(JsonLedgerRepository::open(&config.ledger.path)?),
        };
        let source_repository: Arc<dyn SourceRepository> = Arc::new(
            FileSourceRepository::with_endpoint(Arc::clone(&endpoint_factory)),
        );
        let classifier = config.build_classifier()?;

        Ok(Self::with_components(
            config.to_sync_config(dry_run),
            classifier,
            source_repository,
            ledger,
            endpoint_factory,
        ))
    }

    /// Create a workflow with injected dependencies
    pub fn with_components(
        config: SyncConfig,
        classifier: Classifier,
        source_repository: Arc<dyn SourceRepository>,
        ledger: Arc<dyn LedgerRepository>,
        endpoint_factory: Arc<dyn EndpointFactory>,
    ) -> Self {
        Self {
            config,
            discover_use_case: DiscoverFilesUseCase::new(source_repository),
            filter_use_case: FilterTransferredUseCase::new(Arc::clone(&ledger)),
            route_use_case: RouteFilesUseCase::new(Arc::new(classifier)),
            record_use_case: RecordOutcomesUseCase::new(Arc::clone(&ledger)),
            ledger,
            endpoint_factory,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Execute the sync workflow
    ///
    /// # Errors
    ///
    /// 発見の失敗と台帳の読み取り失敗だけが `Err` になる。
    /// ファイル単位の失敗はサマリーに集計される。
    pub async fn execute(&self, cancel: CancellationToken) -> Result<RunSummary> {
        info!("Starting routesync ({})", self.config.environment);
        info!("Dry run: {}", self.config.dry_run);

        println!("✓ Using configuration:");
        println!("  Environment: {}", self.config.environment);
        println!("  Sources: {}", self.config.sources.len());
        println!("  Endpoint: {}", self.endpoint_factory.describe());
        println!("  Max concurrency: {}", self.config.max_concurrency);

        let ledger_entries = self.ledger.count().await?;
        println!("✓ Ledger holds {} transferred files", ledger_entries);

        let mut summary = RunSummary::new();

        let discovered = self.discover_use_case.execute(&self.config.sources).await?;
        summary.discovered = discovered.len();
        println!("✓ Found {} files", discovered.len());

        let filtered = self.filter_use_case.execute(discovered).await?;
        summary.already_done = filtered.already_done;
        println!(
            "✓ {} already transferred, {} pending",
            filtered.already_done,
            filtered.pending.len()
        );

        let plan = self.route_use_case.execute(filtered.pending);
        summary.routed_bank = plan.bank.len();
        summary.routed_secondary = plan.secondary.len();
        summary.excluded_unmatched = plan.excluded_unmatched.len();
        summary.excluded_date = plan.excluded_date.len();
        println!(
            "✓ Routed {} files (bank: {}, secondary: {}), excluded {} (unmatched: {}, by date: {})",
            summary.routed(),
            summary.routed_bank,
            summary.routed_secondary,
            summary.excluded(),
            summary.excluded_unmatched,
            summary.excluded_date
        );

        if self.config.dry_run {
            println!("✓ Dry-run mode (not actually transferring)");
            println!("  Would transfer {} files:", plan.routed());
            for file in plan.bank.iter().chain(plan.secondary.iter()) {
                println!(
                    "    - [{}] {} -> {}",
                    file.destination_class(),
                    file.source_location(),
                    file.destination_path()
                );
            }
            emit_summary(&summary);
            return Ok(summary);
        }

        if plan.routed() == 0 {
            println!("No files to transfer. Exiting.");
            emit_summary(&summary);
            return Ok(summary);
        }

        let (bank, secondary) = tokio::join!(
            self.run_class(DestinationClass::Bank, plan.bank, cancel.clone()),
            self.run_class(DestinationClass::Secondary, plan.secondary, cancel.clone()),
        );

        for report in [&bank, &secondary] {
            summary.absorb(report);
            print_class_report(report);
        }

        emit_summary(&summary);
        if summary.has_failures() {
            println!(
                "⚠ Sync finished with problems: {} failed, {} skipped, {} not recorded",
                summary.failed, summary.skipped, summary.ledger_anomalies
            );
        } else {
            println!("✓ Sync complete!");
        }

        Ok(summary)
    }

    /// 1つの転送先クラスを転送し、結果を記録する
    async fn run_class(
        &self,
        class: DestinationClass,
        files: Vec<RoutedFile>,
        cancel: CancellationToken,
    ) -> ClassReport {
        if files.is_empty() {
            return ClassReport::new(class);
        }

        let transfer = TransferFilesUseCase::new(
            Arc::clone(&self.endpoint_factory),
            self.config.max_concurrency,
        );
        let outcomes = transfer.spawn(files, cancel);
        self.record_use_case.consume(class, outcomes).await
    }
}

fn print_class_report(report: &ClassReport) {
    if report.transfers.total() == 0 {
        return;
    }

    println!(
        "✓ [{}] Transferred {} files ({} bytes)",
        report.class,
        report.transfers.succeeded.len(),
        report.transfers.bytes_transferred()
    );
    for failed in &report.transfers.failed {
        println!("✗ [{}] {}", report.class, error_sources_to_string(&failed.error));
    }
    for anomaly in &report.ledger_anomalies {
        println!("⚠ [{}] {}", report.class, anomaly.error);
    }
    if !report.transfers.skipped.is_empty() {
        println!(
            "⚠ [{}] Skipped {} files after cancellation",
            report.class,
            report.transfers.skipped.len()
        );
    }
}
