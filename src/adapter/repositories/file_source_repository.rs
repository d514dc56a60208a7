//! File Source Repository Implementation
//!
//! SourceRepositoryの実装（ローカルはファイルシステム、リモートはエンドポイント経由）

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use walkdir::WalkDir;

use crate::domain::entities::file_record::{FileRecord, SourceKind, SourceLocation};
use crate::domain::repositories::remote_endpoint::EndpointFactory;
use crate::domain::repositories::source_repository::SourceRepository;

/// ソースロケーションの列挙
pub struct FileSourceRepository {
    endpoint_factory: Option<Arc<dyn EndpointFactory>>,
}

impl FileSourceRepository {
    /// ローカルのロケーションのみを扱うリポジトリを作成
    pub fn new() -> Self {
        Self {
            endpoint_factory: None,
        }
    }

    /// リモートのロケーションも扱うリポジトリを作成
    pub fn with_endpoint(endpoint_factory: Arc<dyn EndpointFactory>) -> Self {
        Self {
            endpoint_factory: Some(endpoint_factory),
        }
    }

    /// ディレクトリ直下のファイルを列挙する（同期処理）
    fn list_local(dir: &str) -> Result<Vec<FileRecord>> {
        let expanded_path = shellexpand::tilde(dir);
        let root = PathBuf::from(expanded_path.as_ref());

        let metadata = fs::metadata(&root)
            .with_context(|| format!("Cannot access source directory {}", root.display()))?;
        if !metadata.is_dir() {
            anyhow::bail!("Source location is not a directory: {}", root.display());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry =
                entry.with_context(|| format!("Failed to read entry in {}", root.display()))?;

            // リンクは参照先で判定し、参照先が解決できないものは飛ばす
            let metadata = match fs::metadata(entry.path()) {
                Ok(metadata) => metadata,
                Err(e) if entry.path_is_symlink() => {
                    warn!(
                        target: "routesync::discovery",
                        "Skipping unresolvable link {}: {}",
                        entry.path().display(),
                        e
                    );
                    continue;
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to stat {}", entry.path().display()));
                }
            };
            if metadata.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let modified_at = metadata.modified().ok().map(DateTime::<Utc>::from);

            files.push(
                FileRecord::new(name, path_string(entry.path()), SourceKind::Local)?
                    .with_metadata(metadata.len(), modified_at),
            );
        }

        debug!(
            target: "routesync::discovery",
            "Found {} files in {}",
            files.len(),
            root.display()
        );

        Ok(files)
    }

    async fn list_remote(&self, dir: &str) -> Result<Vec<FileRecord>> {
        let factory = self
            .endpoint_factory
            .as_ref()
            .with_context(|| format!("Remote source {} requires a configured endpoint", dir))?;

        let endpoint = factory
            .connect()
            .await
            .with_context(|| format!("Failed to connect to {}", factory.describe()))?;

        let path = dir.to_string();
        let entries = tokio::task::spawn_blocking(move || endpoint.list_directory(&path))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to spawn blocking task: {}", e))?
            .with_context(|| format!("Failed to list remote directory {}", dir))?;

        entries
            .into_iter()
            .filter(|entry| !entry.is_dir)
            .map(|entry| {
                Ok(FileRecord::new(entry.name, entry.path, SourceKind::Remote)?
                    .with_metadata(entry.size, entry.modified_at))
            })
            .collect()
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[async_trait]
impl SourceRepository for FileSourceRepository {
    async fn list_files(&self, location: &SourceLocation) -> Result<Vec<FileRecord>> {
        match location.kind {
            SourceKind::Local => {
                let dir = location.path.clone();
                tokio::task::spawn_blocking(move || Self::list_local(&dir))
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to spawn blocking task: {}", e))?
            }
            SourceKind::Remote => self.list_remote(&location.path).await,
        }
    }
}

impl Default for FileSourceRepository {
    fn default() -> Self {
        Self::new()
    }
}
