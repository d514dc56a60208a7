//! Configuration
//!
//! JSON設定ファイルの読み込みと検証

use std::collections::BTreeMap;
use std::fs;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::application::dto::sync_config::{SyncConfig, DEFAULT_MAX_CONCURRENCY};
use crate::domain::entities::file_record::SourceLocation;
use crate::domain::entities::routed_file::DestinationClass;
use crate::domain::errors::SyncError;
use crate::domain::services::classifier::{ClassRule, Classifier};
use crate::domain::services::naming_rules::{
    default_date_patterns, parse_cutoff, DateGate, DatePattern, DestinationTemplate,
    IdentifierRule, PrefixRule,
};

/// SFTPパスワードを上書きする環境変数
pub const PASSWORD_ENV_VAR: &str = "ROUTESYNC_SFTP_PASSWORD";

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_true() -> bool {
    true
}

fn default_ledger_path() -> String {
    "./routesync.db".to_string()
}

fn default_sftp_port() -> u16 {
    22
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub environment: String,
    /// 日付ゲートの基準日（`DDMMYYYY` または `YYYY-MM-DD`）
    #[serde(default)]
    pub after_date: Option<String>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_true")]
    pub fail_on_transfer_error: bool,
    pub sources: Vec<SourceLocation>,
    #[serde(default)]
    pub ledger: LedgerConfig,
    pub endpoint: EndpointConfig,
    pub routing: RoutingConfig,
    /// `None` なら既定の日付パターンを使う
    #[serde(default)]
    pub date_patterns: Option<Vec<DatePatternConfig>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    #[default]
    Sqlite,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub backend: LedgerBackend,
    #[serde(default = "default_ledger_path")]
    pub path: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            path: default_ledger_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndpointConfig {
    Sftp {
        host: String,
        #[serde(default = "default_sftp_port")]
        port: u16,
        user: String,
        #[serde(default)]
        password: Option<String>,
    },
    /// 転送先パスをローカルディレクトリ配下に対応付ける
    Local { root: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub bank: Option<BankRouteConfig>,
    #[serde(default)]
    pub secondary: Option<SecondaryRouteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BankRouteConfig {
    pub prefixes: Vec<String>,
    pub base_dir: String,
    pub suffix: String,
    /// 識別子 → サブディレクトリ（キーの昇順で評価）
    pub identifiers: BTreeMap<String, String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default = "default_true")]
    pub date_gated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecondaryRouteConfig {
    pub prefixes: Vec<String>,
    pub base_dir: String,
    pub subdir: String,
    pub suffix: String,
    /// 実行環境に関係なく固定する環境タグ（例: "Prod"）
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default = "default_true")]
    pub date_gated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatePatternConfig {
    pub pattern: String,
    pub format: String,
    #[serde(default)]
    pub name_prefix: Option<String>,
}

fn invalid(field: &str, reason: impl Into<String>) -> SyncError {
    SyncError::Configuration {
        field: field.to_string(),
        reason: reason.into(),
    }
}

impl Config {
    /// 設定ファイルを読み込み、環境変数を反映して検証する
    pub fn load(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path);
        let content = fs::read_to_string(expanded.as_ref())
            .with_context(|| format!("Failed to read config file {}", expanded))?;

        let mut config = Self::parse(&content)?;
        config.apply_password_override(std::env::var(PASSWORD_ENV_VAR).ok());
        config.validate()?;
        Ok(config)
    }

    /// JSON文字列を解釈する（検証はしない）
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse config JSON")
    }

    /// SFTPパスワードを上書きする
    pub fn apply_password_override(&mut self, password: Option<String>) {
        let Some(password) = password.filter(|p| !p.is_empty()) else {
            return;
        };
        if let EndpointConfig::Sftp {
            password: current, ..
        } = &mut self.endpoint
        {
            *current = Some(password);
        }
    }

    /// 設定を検証する
    ///
    /// # Errors
    ///
    /// 不正な項目があれば `SyncError::Configuration` を返す
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.environment.trim().is_empty() {
            return Err(invalid("environment", "must not be empty"));
        }
        if self.max_concurrency == 0 {
            return Err(invalid("max_concurrency", "must be greater than 0"));
        }
        if self.sources.is_empty() {
            return Err(invalid("sources", "at least one source location is required"));
        }
        if self.sources.iter().any(|source| source.path.trim().is_empty()) {
            return Err(invalid("sources", "source path must not be empty"));
        }
        if self.ledger.path.trim().is_empty() {
            return Err(invalid("ledger.path", "must not be empty"));
        }

        match &self.endpoint {
            EndpointConfig::Sftp { host, user, .. } => {
                if host.trim().is_empty() {
                    return Err(invalid("endpoint.host", "must not be empty"));
                }
                if user.trim().is_empty() {
                    return Err(invalid("endpoint.user", "must not be empty"));
                }
            }
            EndpointConfig::Local { root } => {
                if root.trim().is_empty() {
                    return Err(invalid("endpoint.root", "must not be empty"));
                }
            }
        }

        if self.routing.bank.is_none() && self.routing.secondary.is_none() {
            return Err(invalid("routing", "at least one destination class is required"));
        }
        if let Some(bank) = &self.routing.bank {
            if bank.prefixes.is_empty() {
                return Err(invalid("routing.bank.prefixes", "must not be empty"));
            }
            if bank.identifiers.is_empty() {
                return Err(invalid("routing.bank.identifiers", "must not be empty"));
            }
        }
        if let Some(secondary) = &self.routing.secondary {
            if secondary.prefixes.is_empty() {
                return Err(invalid("routing.secondary.prefixes", "must not be empty"));
            }
        }

        self.cutoff()?;
        self.date_patterns()?;
        Ok(())
    }

    /// 日付ゲートの基準日
    pub fn cutoff(&self) -> Result<Option<NaiveDate>, SyncError> {
        match &self.after_date {
            None => Ok(None),
            Some(value) if value.trim().is_empty() => Ok(None),
            Some(value) => parse_cutoff(value).map(Some).ok_or_else(|| {
                invalid(
                    "after_date",
                    format!("'{}' is neither DDMMYYYY nor YYYY-MM-DD", value),
                )
            }),
        }
    }

    fn date_patterns(&self) -> Result<Vec<DatePattern>, SyncError> {
        let Some(configured) = &self.date_patterns else {
            return Ok(default_date_patterns());
        };

        configured
            .iter()
            .map(|entry| {
                DatePattern::new(&entry.pattern, entry.format.clone(), entry.name_prefix.clone())
                    .map_err(|e| invalid("date_patterns", format!("{}: {}", entry.pattern, e)))
            })
            .collect()
    }

    /// 命名規則から分類器を組み立てる（銀行クラスが先に評価される）
    pub fn build_classifier(&self) -> Result<Classifier, SyncError> {
        let mut rules = Vec::new();

        if let Some(bank) = &self.routing.bank {
            rules.push(ClassRule {
                class: DestinationClass::Bank,
                prefixes: PrefixRule::new(bank.prefixes.clone()),
                identifiers: Some(IdentifierRule::new(bank.identifiers.clone())),
                template: DestinationTemplate {
                    base_dir: bank.base_dir.clone(),
                    subdir: None,
                    environment: bank
                        .environment
                        .clone()
                        .unwrap_or_else(|| self.environment.clone()),
                    suffix: bank.suffix.clone(),
                },
                date_gated: bank.date_gated,
            });
        }

        if let Some(secondary) = &self.routing.secondary {
            rules.push(ClassRule {
                class: DestinationClass::Secondary,
                prefixes: PrefixRule::new(secondary.prefixes.clone()),
                identifiers: None,
                template: DestinationTemplate {
                    base_dir: secondary.base_dir.clone(),
                    subdir: Some(secondary.subdir.clone()),
                    environment: secondary
                        .environment
                        .clone()
                        .unwrap_or_else(|| self.environment.clone()),
                    suffix: secondary.suffix.clone(),
                },
                date_gated: secondary.date_gated,
            });
        }

        let date_gate = match self.cutoff()? {
            Some(cutoff) => Some(DateGate::new(cutoff, self.date_patterns()?)),
            None => None,
        };

        Ok(Classifier::new(rules, date_gate))
    }

    /// 実行用の設定に変換する
    pub fn to_sync_config(&self, dry_run: bool) -> SyncConfig {
        SyncConfig::new(
            self.sources.clone(),
            self.environment.clone(),
            self.max_concurrency,
        )
        .with_dry_run(dry_run)
        .with_fail_on_transfer_error(self.fail_on_transfer_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::file_record::{FileRecord, SourceKind};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        "environment": "UAT",
        "after_date": "12012024",
        "max_concurrency": 4,
        "sources": [
            { "path": "/data/outbox" },
            { "path": "/incoming", "kind": "remote" }
        ],
        "ledger": { "backend": "json", "path": "/var/lib/routesync/ledger.json" },
        "endpoint": { "kind": "sftp", "host": "sftp.example.com", "user": "sftpuser" },
        "routing": {
            "bank": {
                "prefixes": ["CL.", "POS_"],
                "base_dir": "/home/sftp/files/TTP",
                "suffix": "from_tadawul",
                "identifiers": { "000005": "MED", "000002": "ATIB" }
            },
            "secondary": {
                "prefixes": ["TT_"],
                "base_dir": "/home/sftp/files",
                "subdir": "TT",
                "environment": "Prod",
                "suffix": "from_tadawul"
            }
        }
    }"#;

    fn record(name: &str) -> FileRecord {
        FileRecord::new(name, format!("/data/outbox/{}", name), SourceKind::Local).unwrap()
    }

    #[test]
    fn test_parse_sample_with_defaults() {
        let config = Config::parse(SAMPLE).unwrap();

        assert_eq!(config.environment, "UAT");
        assert_eq!(config.max_concurrency, 4);
        assert!(config.fail_on_transfer_error);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].kind, SourceKind::Local);
        assert_eq!(config.sources[1].kind, SourceKind::Remote);
        assert_eq!(config.ledger.backend, LedgerBackend::Json);
        assert!(matches!(
            config.endpoint,
            EndpointConfig::Sftp { port: 22, password: None, .. }
        ));
        assert!(config.date_patterns.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ledger_defaults_to_sqlite() {
        let json = r#"{
            "environment": "UAT",
            "sources": [{ "path": "/data" }],
            "endpoint": { "kind": "local", "root": "/tmp/staging" },
            "routing": { "secondary": {
                "prefixes": ["TT_"], "base_dir": "/files", "subdir": "TT", "suffix": "in"
            } }
        }"#;
        let config = Config::parse(json).unwrap();

        assert_eq!(config.ledger.backend, LedgerBackend::Sqlite);
        assert_eq!(config.ledger.path, "./routesync.db");
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert!(config.after_date.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_password_override() {
        let mut config = Config::parse(SAMPLE).unwrap();

        config.apply_password_override(Some(String::new()));
        assert!(matches!(config.endpoint, EndpointConfig::Sftp { password: None, .. }));

        config.apply_password_override(Some("from-env".to_string()));
        assert!(matches!(
            &config.endpoint,
            EndpointConfig::Sftp { password: Some(p), .. } if p == "from-env"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.max_concurrency = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, SyncError::Configuration { ref field, .. } if field == "max_concurrency"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_validate_rejects_empty_sources() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.sources.clear();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_cutoff() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.after_date = Some("2024/01/12".to_string());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("after_date"));
    }

    #[test]
    fn test_validate_rejects_bad_regex() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.date_patterns = Some(vec![DatePatternConfig {
            pattern: r"(\d{8".to_string(),
            format: "%d%m%Y".to_string(),
            name_prefix: None,
        }]);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("date_patterns"));
    }

    #[test]
    fn test_iso_cutoff_accepted() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.after_date = Some("2024-01-12".to_string());

        assert_eq!(config.cutoff().unwrap(), NaiveDate::from_ymd_opt(2024, 1, 12));
    }

    #[test]
    fn test_build_classifier_routes_both_classes() {
        let config = Config::parse(SAMPLE).unwrap();
        let classifier = config.build_classifier().unwrap();

        let bank = classifier.classify(&record("CL.000005.240113")).unwrap();
        assert_eq!(
            bank.destination_path(),
            "/home/sftp/files/TTP/MED/UAT/from_tadawul/CL.000005.240113"
        );

        let secondary = classifier.classify(&record("TT_report_16012024.csv")).unwrap();
        assert_eq!(
            secondary.destination_path(),
            "/home/sftp/files/TT/Prod/from_tadawul/TT_report_16012024.csv"
        );

        // 基準日以前
        assert!(classifier.classify(&record("CL.000005.240110")).is_none());
    }

    #[test]
    fn test_build_classifier_without_cutoff_has_no_gate() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.after_date = None;

        let classifier = config.build_classifier().unwrap();
        assert!(classifier.date_gate().is_none());
        assert!(classifier.classify(&record("TT_undated.csv")).is_some());
    }

    #[test]
    fn test_to_sync_config() {
        let config = Config::parse(SAMPLE).unwrap();
        let sync = config.to_sync_config(true);

        assert_eq!(sync.environment, "UAT");
        assert_eq!(sync.max_concurrency, 4);
        assert!(sync.dry_run);
        assert!(sync.fail_on_transfer_error);
        assert_eq!(sync.sources.len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.routing.bank.unwrap().identifiers.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Config::load("/nonexistent/routesync/config.json").is_err());
    }
}
