//! # Naming Rules
//!
//! ファイル名の命名規則（状態を持たない純粋関数群）
//!
//! - **PrefixRule**: 先頭一致
//! - **IdentifierRule**: 埋め込み識別子（キーのソート順で最初に一致したもの）
//! - **DateGate**: 埋め込み日付の抽出と基準日との比較
//! - **DestinationTemplate**: 転送先ディレクトリの組み立て

use std::collections::BTreeMap;

use chrono::NaiveDate;
use regex::Regex;

use crate::domain::entities::routed_file::join_remote_path;
use crate::domain::errors::SyncError;

/// 先頭一致ルール
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixRule {
    prefixes: Vec<String>,
}

impl PrefixRule {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// いずれかのプレフィックスで始まるか
    ///
    /// ```
    /// use routesync::domain::services::naming_rules::PrefixRule;
    ///
    /// let rule = PrefixRule::new(vec!["CL.".to_string()]);
    /// assert!(rule.matches("CL.001"));
    /// assert!(!rule.matches("XYZ.002"));
    /// ```
    pub fn matches(&self, name: &str) -> bool {
        self.prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// 埋め込み識別子ルール
///
/// ファイル名に識別子（金融機関コードなど）が含まれていれば、
/// 対応するサブディレクトリを返す。識別子はキーのソート順に評価する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierRule {
    identifiers: BTreeMap<String, String>,
}

impl IdentifierRule {
    pub fn new(identifiers: BTreeMap<String, String>) -> Self {
        Self { identifiers }
    }

    /// 最初に一致した識別子のサブディレクトリ
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|(identifier, _)| name.contains(identifier.as_str()))
            .map(|(_, subdir)| subdir.as_str())
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

/// 日付パターン
///
/// 正規表現で候補トークンを探し、最後に一致したトークンを chrono のフォーマットで解釈する。
/// キャプチャグループ1があればそれを、なければ一致全体を使う。
#[derive(Debug, Clone)]
pub struct DatePattern {
    regex: Regex,
    format: String,
    name_prefix: Option<String>,
}

impl DatePattern {
    /// # Errors
    ///
    /// 正規表現が不正な場合にエラーを返す
    pub fn new(
        pattern: &str,
        format: impl Into<String>,
        name_prefix: Option<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            format: format.into(),
            name_prefix,
        })
    }

    /// ファイル名から日付を取り出す
    pub fn extract(&self, name: &str) -> Option<NaiveDate> {
        if let Some(prefix) = &self.name_prefix {
            if !name.starts_with(prefix.as_str()) {
                return None;
            }
        }

        let captures = self.regex.captures_iter(name).last()?;
        let token = captures.get(1).or_else(|| captures.get(0))?.as_str();

        NaiveDate::parse_from_str(token, &self.format).ok()
    }
}

/// 既定の日付パターン（優先順）
///
/// 1. `PersoFile_` で始まる名前: 最後の `.` の直前6桁を `YYMMDD`
/// 2. 8桁の数字を `DDMMYYYY`
/// 3. 6桁の数字を `YYMMDD`
pub fn default_date_patterns() -> Vec<DatePattern> {
    let defaults: [(&str, &str, Option<&str>); 3] = [
        (r"(\d{6})\.[^.]*$", "%y%m%d", Some("PersoFile_")),
        (r"\d{8}", "%d%m%Y", None),
        (r"\d{6}", "%y%m%d", None),
    ];

    defaults
        .iter()
        .filter_map(|(pattern, format, prefix)| {
            DatePattern::new(pattern, *format, prefix.map(str::to_string)).ok()
        })
        .collect()
}

/// 基準日の文字列を解釈する（`YYYY-MM-DD` または `DDMMYYYY`）
pub fn parse_cutoff(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d%m%Y"))
        .ok()
}

/// 日付ゲート
///
/// 埋め込み日付が基準日より厳密に後のファイルだけを通す。
/// 日付が取れないファイルは失敗ではなく「対象外」。
#[derive(Debug, Clone)]
pub struct DateGate {
    cutoff: NaiveDate,
    patterns: Vec<DatePattern>,
}

impl DateGate {
    pub fn new(cutoff: NaiveDate, patterns: Vec<DatePattern>) -> Self {
        Self { cutoff, patterns }
    }

    pub fn with_default_patterns(cutoff: NaiveDate) -> Self {
        Self::new(cutoff, default_date_patterns())
    }

    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    /// 最初に解釈できたパターンの日付
    pub fn extract_date(&self, name: &str) -> Option<NaiveDate> {
        self.patterns.iter().find_map(|pattern| pattern.extract(name))
    }

    /// ゲートを通過するか
    ///
    /// # Errors
    ///
    /// 日付が取れない場合は `DateParseMiss`、基準日以前なら `DateBeforeCutoff`
    pub fn admit(&self, name: &str) -> Result<NaiveDate, SyncError> {
        let date = self
            .extract_date(name)
            .ok_or_else(|| SyncError::DateParseMiss {
                file_name: name.to_string(),
            })?;

        if date > self.cutoff {
            Ok(date)
        } else {
            Err(SyncError::DateBeforeCutoff {
                file_name: name.to_string(),
                date,
                cutoff: self.cutoff,
            })
        }
    }
}

/// 転送先テンプレート
///
/// `base_dir / subdir / environment / suffix`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationTemplate {
    pub base_dir: String,
    pub subdir: Option<String>,
    pub environment: String,
    pub suffix: String,
}

impl DestinationTemplate {
    /// 転送先ディレクトリを組み立てる
    ///
    /// `subdir` が渡された場合はテンプレートのサブディレクトリより優先する
    pub fn directory(&self, subdir: Option<&str>) -> String {
        let subdir = subdir.or(self.subdir.as_deref()).unwrap_or_default();
        join_remote_path(&[
            self.base_dir.as_str(),
            subdir,
            self.environment.as_str(),
            self.suffix.as_str(),
        ])
    }
}
