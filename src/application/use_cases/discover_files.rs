//! # Discover Files Use Case
//!
//! ファイル発見ユースケース

use std::sync::Arc;

use anyhow::Result;
use log::{error, info};

use crate::domain::entities::file_record::{FileRecord, SourceLocation};
use crate::domain::errors::{error_chain_to_string, SyncError};
use crate::domain::repositories::source_repository::SourceRepository;

/// ファイル発見ユースケース
///
/// 設定されたソースロケーションを記述順に走査し、直下のファイルを集める。
/// 1つでも列挙できないロケーションがあれば実行全体を中断する。
pub struct DiscoverFilesUseCase<R: SourceRepository + ?Sized> {
    source_repository: Arc<R>,
}

impl<R: SourceRepository + ?Sized> DiscoverFilesUseCase<R> {
    /// 新しいユースケースを作成
    ///
    /// # Arguments
    ///
    /// * `source_repository` - ソースリポジトリ
    pub fn new(source_repository: Arc<R>) -> Self {
        Self { source_repository }
    }

    /// ファイルを発見する
    ///
    /// # Arguments
    ///
    /// * `locations` - ソースロケーション（記述順）
    ///
    /// # Returns
    ///
    /// 発見されたファイルレコード
    ///
    /// # Errors
    ///
    /// いずれかのロケーションが列挙できない場合に `SyncError::Discovery` を返す
    pub async fn execute(&self, locations: &[SourceLocation]) -> Result<Vec<FileRecord>> {
        info!(
            target: "routesync::discovery",
            "[DISCOVERY/START] Scanning {} source location(s)",
            locations.len()
        );

        let mut files = Vec::new();
        for location in locations {
            let found = match self.source_repository.list_files(location).await {
                Ok(found) => found,
                Err(e) => {
                    let reason = error_chain_to_string(&e);
                    error!(
                        target: "routesync::discovery",
                        "[DISCOVERY/FAILED] {}: {}", location.path, reason
                    );
                    return Err(SyncError::Discovery {
                        location: location.path.clone(),
                        reason,
                    }
                    .into());
                }
            };

            info!(
                target: "routesync::discovery",
                "[DISCOVERY/SUCCESS] {} file(s) in {}",
                found.len(),
                location.path
            );
            files.extend(found);
        }

        info!(
            target: "routesync::discovery",
            "[DISCOVERY/END] {} file(s) discovered",
            files.len()
        );

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    use crate::domain::entities::file_record::SourceKind;

    struct MockSourceRepository {
        listings: HashMap<String, Vec<&'static str>>,
    }

    #[async_trait]
    impl SourceRepository for MockSourceRepository {
        async fn list_files(&self, location: &SourceLocation) -> Result<Vec<FileRecord>> {
            let Some(names) = self.listings.get(&location.path) else {
                anyhow::bail!("No such file or directory");
            };
            names
                .iter()
                .map(|name| {
                    FileRecord::new(*name, format!("{}/{}", location.path, name), location.kind)
                })
                .collect()
        }
    }

    fn repository(listings: &[(&str, Vec<&'static str>)]) -> Arc<MockSourceRepository> {
        Arc::new(MockSourceRepository {
            listings: listings
                .iter()
                .map(|(path, names)| (path.to_string(), names.clone()))
                .collect(),
        })
    }

    #[tokio::test]
    async fn test_discover_files_in_location_order() {
        let repo = repository(&[
            ("/a", vec!["CL.000001.240113", "TT_1.csv"]),
            ("/b", vec!["POS_000002_16012024.txt"]),
        ]);
        let use_case = DiscoverFilesUseCase::new(repo);

        let files = use_case
            .execute(&[SourceLocation::local("/a"), SourceLocation::remote("/b")])
            .await
            .unwrap();

        assert_eq!(files.len(), 3);
        assert_eq!(files[0].name, "CL.000001.240113");
        assert_eq!(files[2].source_location, "/b/POS_000002_16012024.txt");
        assert_eq!(files[2].source_kind, SourceKind::Remote);
    }

    #[tokio::test]
    async fn test_discover_files_empty_location() {
        let repo = repository(&[("/empty", vec![])]);
        let use_case = DiscoverFilesUseCase::new(repo);

        let files = use_case
            .execute(&[SourceLocation::local("/empty")])
            .await
            .unwrap();

        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_unlistable_location_is_fatal() {
        let repo = repository(&[("/a", vec!["CL.000001.240113"])]);
        let use_case = DiscoverFilesUseCase::new(repo);

        let err = use_case
            .execute(&[SourceLocation::local("/a"), SourceLocation::local("/missing")])
            .await
            .unwrap_err();

        let sync_error = err.downcast_ref::<SyncError>().unwrap();
        assert!(sync_error.is_fatal());
        assert!(matches!(
            sync_error,
            SyncError::Discovery { location, .. } if location == "/missing"
        ));
    }
}
