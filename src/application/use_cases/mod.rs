//! # Use Cases
//!
//! アプリケーションのビジネスフロー（ユースケース）
//!
//! ## ユースケース
//!
//! - **DiscoverFilesUseCase**: ソースロケーションからのファイル発見
//! - **FilterTransferredUseCase**: 台帳による転送済みファイルの除外
//! - **RouteFilesUseCase**: 命名規則による分類とルーティング
//! - **TransferFilesUseCase**: 同時実行数を制限した転送
//! - **RecordOutcomesUseCase**: 転送結果の台帳記録と集計

pub mod discover_files;
pub mod filter_transferred;
pub mod record_outcomes;
pub mod route_files;
pub mod transfer_files;
