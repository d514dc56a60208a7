//! # routesync
//!
//! ローカルまたはリモートのソースからファイルを発見し、命名規則で転送先を決め、
//! SFTPエンドポイントへ一度だけ転送するツール
//!
//! このプロジェクトはクリーンアーキテクチャを採用しており、以下の4層で構成されています：
//!
//! - **Domain層**: ファイルレコード、命名規則、分類器、エラー分類（外部依存なし）
//! - **Application層**: 発見・台帳フィルタ・分類・転送・結果記録のユースケース
//! - **Adapter層**: 外部システムとの統合（SFTP, ファイルシステム, SQLite/JSON台帳）
//! - **Driver層**: CLI、依存性注入、キャンセル

// coverage_nightly cfg が設定されている場合のみ coverage_attribute を有効化
// カバレッジ計測時に外部サービス依存コードを除外するために使用
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// Domain層（純粋なビジネスロジック）
pub mod domain;

// Application層（ユースケース）
pub mod application;

// Adapter層（Infrastructure）
pub mod adapter;

// Driver層（Presentation）
pub mod driver;
