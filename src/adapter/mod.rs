//! Adapter Layer
//!
//! 外部システム（SFTP, ファイルシステム, SQLite）との統合

pub mod config;
pub mod endpoint;
pub mod repositories;
