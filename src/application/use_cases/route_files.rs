//! # Route Files Use Case
//!
//! 命名規則による分類とルーティング

use std::sync::Arc;

use log::{debug, info};

use crate::domain::entities::file_record::FileRecord;
use crate::domain::services::classifier::{Classifier, RoutingDecision, RoutingPlan};

/// ルーティングユースケース
pub struct RouteFilesUseCase {
    classifier: Arc<Classifier>,
}

impl RouteFilesUseCase {
    pub fn new(classifier: Arc<Classifier>) -> Self {
        Self { classifier }
    }

    /// ファイルを分類し、ルーティング計画を作る
    ///
    /// 除外はエラーではなく、計画の件数として数える
    pub fn execute(&self, files: Vec<FileRecord>) -> RoutingPlan {
        let mut plan = RoutingPlan::default();

        for file in &files {
            let decision = self.classifier.route(file);
            match &decision {
                RoutingDecision::Routed(routed) => debug!(
                    target: "routesync::routing",
                    "[ROUTE/{}] {} -> {}",
                    routed.destination_class(),
                    routed.name(),
                    routed.destination_path()
                ),
                RoutingDecision::Excluded { reason, .. } => debug!(
                    target: "routesync::routing",
                    "[ROUTE/EXCLUDED] {}", reason
                ),
            }
            plan.push(decision);
        }

        info!(
            target: "routesync::routing",
            "[ROUTE/END] bank={} secondary={} unmatched={} excluded_by_date={}",
            plan.bank.len(),
            plan.secondary.len(),
            plan.excluded_unmatched.len(),
            plan.excluded_date.len()
        );

        plan
    }
}
