//! # Sync Configuration DTO
//!
//! 1回の実行で使う設定のData Transfer Object（実行中は変更しない）

use crate::domain::entities::file_record::SourceLocation;

/// 既定の同時転送数（クラスごと）
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// 同期設定
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 走査するソースロケーション（記述順）
    pub sources: Vec<SourceLocation>,
    /// 環境タグ（例: "UAT", "Prod"）
    pub environment: String,
    /// 転送先クラスごとの同時転送数の上限
    pub max_concurrency: usize,
    /// 転送失敗が残った場合に非ゼロで終了するか
    pub fail_on_transfer_error: bool,
    /// 転送せず計画のみ表示
    pub dry_run: bool,
}

impl SyncConfig {
    /// 新しい同期設定を作成します。
    ///
    /// # 例
    ///
    /// ```
    /// use routesync::application::dto::sync_config::SyncConfig;
    /// use routesync::domain::entities::file_record::SourceLocation;
    ///
    /// let config = SyncConfig::new(
    ///     vec![SourceLocation::local("/data/outbox")],
    ///     "UAT".to_string(),
    ///     10,
    /// );
    ///
    /// assert_eq!(config.max_concurrency, 10);
    /// assert!(config.fail_on_transfer_error);
    /// assert!(!config.dry_run);
    /// ```
    ///
    /// 同時転送数0は1に切り上げる：
    ///
    /// ```
    /// # use routesync::application::dto::sync_config::SyncConfig;
    /// let config = SyncConfig::new(vec![], "Prod".to_string(), 0);
    /// assert_eq!(config.max_concurrency, 1);
    /// ```
    pub fn new(sources: Vec<SourceLocation>, environment: String, max_concurrency: usize) -> Self {
        Self {
            sources,
            environment,
            max_concurrency: max_concurrency.max(1),
            fail_on_transfer_error: true,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_fail_on_transfer_error(mut self, fail: bool) -> Self {
        self.fail_on_transfer_error = fail;
        self
    }
}
