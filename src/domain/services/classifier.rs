//! # Classifier Service
//!
//! 命名規則によるファイルの分類とルーティング

use log::warn;

use super::naming_rules::{DateGate, DestinationTemplate, IdentifierRule, PrefixRule};
use crate::domain::entities::file_record::FileRecord;
use crate::domain::entities::routed_file::{DestinationClass, RoutedFile};
use crate::domain::errors::SyncError;

/// クラスごとのルール
///
/// プレフィックスでクラスを決め、識別子ルールがあればサブディレクトリを選ぶ
#[derive(Debug, Clone)]
pub struct ClassRule {
    pub class: DestinationClass,
    pub prefixes: PrefixRule,
    pub identifiers: Option<IdentifierRule>,
    pub template: DestinationTemplate,
    pub date_gated: bool,
}

/// 分類結果
#[derive(Debug)]
pub enum RoutingDecision {
    Routed(RoutedFile),
    /// 除外理由は `ClassificationMiss` / `DateParseMiss` / `DateBeforeCutoff`
    Excluded { file: FileRecord, reason: SyncError },
}

impl RoutingDecision {
    pub fn into_routed(self) -> Option<RoutedFile> {
        match self {
            RoutingDecision::Routed(routed) => Some(routed),
            RoutingDecision::Excluded { .. } => None,
        }
    }
}

/// 分類器
///
/// ルールは登録順に評価し（先に登録したクラスが優先）、
/// 同じ入力には常に同じ結果を返す
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: Vec<ClassRule>,
    date_gate: Option<DateGate>,
}

impl Classifier {
    pub fn new(rules: Vec<ClassRule>, date_gate: Option<DateGate>) -> Self {
        Self { rules, date_gate }
    }

    pub fn rules(&self) -> &[ClassRule] {
        &self.rules
    }

    pub fn date_gate(&self) -> Option<&DateGate> {
        self.date_gate.as_ref()
    }

    /// ファイルを分類し、転送先を決める
    ///
    /// プレフィックスが一致しても識別子が見つからないルールは飛ばし、
    /// 次のルールを試す。どのルールにも当てはまらなければ `ClassificationMiss`
    pub fn route(&self, file: &FileRecord) -> RoutingDecision {
        for rule in self.rules.iter().filter(|rule| rule.prefixes.matches(&file.name)) {
            let subdir = match &rule.identifiers {
                Some(identifiers) => match identifiers.resolve(&file.name) {
                    Some(subdir) => Some(subdir),
                    None => continue,
                },
                None => None,
            };

            if rule.date_gated {
                if let Some(gate) = &self.date_gate {
                    if let Err(reason) = gate.admit(&file.name) {
                        return RoutingDecision::Excluded {
                            file: file.clone(),
                            reason,
                        };
                    }
                }
            }

            let destination_dir = rule.template.directory(subdir);
            match RoutedFile::new(file.clone(), rule.class, destination_dir) {
                Ok(routed) => return RoutingDecision::Routed(routed),
                Err(e) => {
                    warn!(target: "routesync::routing", "Cannot route {}: {}", file.name, e);
                }
            }
        }

        RoutingDecision::Excluded {
            file: file.clone(),
            reason: SyncError::ClassificationMiss {
                file_name: file.name.clone(),
            },
        }
    }

    /// 分類できたファイルだけを返す
    pub fn classify(&self, file: &FileRecord) -> Option<RoutedFile> {
        self.route(file).into_routed()
    }
}

/// ルーティング計画
///
/// 入力の各ファイルは `bank` / `secondary` / 除外（規則不一致）/ 除外（日付）のいずれか1つに入る
#[derive(Debug, Default)]
pub struct RoutingPlan {
    pub bank: Vec<RoutedFile>,
    pub secondary: Vec<RoutedFile>,
    pub excluded_unmatched: Vec<FileRecord>,
    pub excluded_date: Vec<FileRecord>,
}

impl RoutingPlan {
    pub fn push(&mut self, decision: RoutingDecision) {
        match decision {
            RoutingDecision::Routed(routed) => match routed.destination_class() {
                DestinationClass::Bank => self.bank.push(routed),
                DestinationClass::Secondary => self.secondary.push(routed),
                DestinationClass::Unmatched => self.excluded_unmatched.push(routed.file().clone()),
            },
            RoutingDecision::Excluded { file, reason } => {
                if reason.is_date_exclusion() {
                    self.excluded_date.push(file);
                } else {
                    self.excluded_unmatched.push(file);
                }
            }
        }
    }

    pub fn routed(&self) -> usize {
        self.bank.len() + self.secondary.len()
    }

    pub fn total(&self) -> usize {
        self.routed() + self.excluded_unmatched.len() + self.excluded_date.len()
    }
}
