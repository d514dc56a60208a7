//! CLI Argument Parsing
//!
//! CLIの引数解析

use clap::Parser;

use crate::adapter::config::Config;

/// ファイルを命名規則に従って振り分け、SFTPへ一度だけ転送するCLI
#[derive(Parser, Debug, Clone)]
#[command(name = "routesync")]
#[command(about = "Route produced files to their SFTP destinations exactly once", long_about = None)]
pub struct Args {
    /// Config file path
    #[arg(short, long, default_value = "./config.json")]
    pub config: String,

    /// Dry run mode - print the routing plan without transferring
    #[arg(long)]
    pub dry_run: bool,

    /// Override max concurrent transfers per destination class
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Override the environment tag (e.g. UAT, Prod)
    #[arg(long)]
    pub environment: Option<String>,

    /// Also append log output to this file
    #[arg(long)]
    pub log_file: Option<String>,
}

impl Args {
    /// CLIで指定された値で設定を上書きする
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(concurrency) = self.concurrency {
            config.max_concurrency = concurrency;
        }
        if let Some(environment) = &self.environment {
            config.environment = environment.clone();
        }
    }
}
