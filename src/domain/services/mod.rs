//! # Domain Services
//!
//! 命名規則と分類のビジネスルール
//!
//! - **naming_rules**: プレフィックス、識別子、日付ゲート、転送先テンプレート
//! - **classifier**: ルールを組み合わせたファイルの分類とルーティング

pub mod classifier;
pub mod naming_rules;
