//! routesync - File Router
//!
//! ファイルを命名規則で振り分け、SFTPの転送先へ一度だけ転送する

// coverage_nightly cfg が設定されている場合のみ coverage_attribute を有効化
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{error, warn};
use tokio_util::sync::CancellationToken;

use routesync::adapter::config::Config;
use routesync::domain::entities::run_summary::EXIT_FATAL;
use routesync::domain::errors::{error_chain_to_string, fatal_cause};
use routesync::driver::logging::init_logger;
use routesync::driver::{Args, FileSyncWorkflow};

#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logger(args.log_file.as_deref())?;

    // Load configuration (CLI flags win over the file)
    let mut config = Config::load(&args.config)?;
    args.apply_overrides(&mut config);
    config.validate()?;

    // Create workflow with injected dependencies
    let workflow = FileSyncWorkflow::new(&config, args.dry_run)?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, waiting for in-flight transfers to finish");
            signal_token.cancel();
        }
    });

    let result = workflow.execute(cancel).await;
    log::logger().flush();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            let Some(cause) = fatal_cause(&e) else {
                return Err(e);
            };
            error!(target: "routesync::summary", "[RUN/ABORT] {}", cause);
            log::logger().flush();
            println!("✗ Run aborted: {}", error_chain_to_string(&e));
            return Ok(ExitCode::from(EXIT_FATAL));
        }
    };
    Ok(ExitCode::from(
        summary.exit_code(workflow.config().fail_on_transfer_error),
    ))
}
