//! Repository Implementations
//!
//! Domain層のRepositoryトレイトの実装

pub mod file_source_repository;
pub mod json_ledger_repository;
pub mod sqlite_ledger_repository;
