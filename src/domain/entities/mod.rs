//! # Domain Entities
//!
//! ビジネスエンティティとバリューオブジェクトを定義するモジュール
//!
//! ## エンティティ
//!
//! - **FileRecord**: 発見されたファイル
//! - **RoutedFile**: 転送先が決まったファイル
//! - **LedgerEntry**: 転送台帳のエントリ
//! - **TransferOutcome**: ファイル単位の転送結果
//! - **RunSummary**: 実行サマリーのバリューオブジェクト

pub mod file_record;
pub mod ledger_entry;
pub mod routed_file;
pub mod run_summary;
pub mod transfer_outcome;
