//! SQLite Ledger Repository Implementation
//!
//! LedgerRepositoryのSQLite実装

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use rusqlite::{params, Connection};

use crate::domain::entities::ledger_entry::LedgerEntry;
use crate::domain::repositories::ledger_repository::LedgerRepository;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS uploaded_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    source_path TEXT NOT NULL,
    dest_path TEXT NOT NULL,
    file_name TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_uploaded_logs_file_name ON uploaded_logs(file_name);
";

/// SQLiteベースの台帳リポジトリ
///
/// 接続は1本だけ持ち、Mutexで全アクセスを直列化する
pub struct SqliteLedgerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedgerRepository {
    /// 台帳を開く（なければ作成）
    ///
    /// # Errors
    ///
    /// データベースを開けない、またはスキーマを適用できない場合にエラーを返す
    pub fn open(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path);
        let path = Path::new(expanded.as_ref());

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context("Failed to create ledger directory")?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open ledger database {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let repository = Self::with_connection(conn)?;
        info!(
            target: "routesync::ledger",
            "Opened SQLite ledger at {}",
            path.display()
        );
        Ok(repository)
    }

    /// インメモリの台帳を開く（テスト用）
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to apply ledger schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
        conn.lock()
            .map_err(|_| anyhow::anyhow!("Ledger connection lock poisoned"))
    }

    fn is_transferred_sync(conn: &Mutex<Connection>, file_name: &str) -> Result<bool> {
        let conn = Self::lock(conn)?;
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM uploaded_logs WHERE file_name = ?1)",
                params![file_name],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to query ledger for {}", file_name))?;
        Ok(exists)
    }

    fn record_sync(conn: &Mutex<Connection>, entry: &LedgerEntry) -> Result<()> {
        let mut conn = Self::lock(conn)?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO uploaded_logs (timestamp, source_path, dest_path, file_name)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.timestamp.to_rfc3339(),
                entry.source_path,
                entry.destination_path,
                entry.file_name
            ],
        )
        .with_context(|| format!("Failed to insert ledger entry for {}", entry.file_name))?;
        tx.commit()
            .with_context(|| format!("Failed to commit ledger entry for {}", entry.file_name))?;
        Ok(())
    }

    fn count_sync(conn: &Mutex<Connection>) -> Result<u64> {
        let conn = Self::lock(conn)?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM uploaded_logs", [], |row| row.get(0))
            .context("Failed to count ledger entries")?;
        Ok(count as u64)
    }
}

#[async_trait]
impl LedgerRepository for SqliteLedgerRepository {
    async fn is_transferred(&self, file_name: &str) -> Result<bool> {
        let conn = Arc::clone(&self.conn);
        let file_name = file_name.to_string();
        tokio::task::spawn_blocking(move || Self::is_transferred_sync(&conn, &file_name))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to spawn blocking task: {}", e))?
    }

    async fn record(&self, entry: &LedgerEntry) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let entry = entry.clone();
        tokio::task::spawn_blocking(move || Self::record_sync(&conn, &entry))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to spawn blocking task: {}", e))?
    }

    async fn count(&self) -> Result<u64> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || Self::count_sync(&conn))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to spawn blocking task: {}", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::TempDir;

    fn entry(name: &str) -> LedgerEntry {
        LedgerEntry::new(
            name,
            format!("/data/outbox/{}", name),
            format!("/home/sftp/files/TTP/MED/UAT/from_tadawul/{}", name),
            Utc.with_ymd_and_hms(2024, 1, 13, 8, 30, 0).unwrap(),
        )
    }

    /// ファイル名の全エントリを記録順に返す
    fn entries_for(ledger: &SqliteLedgerRepository, file_name: &str) -> Vec<LedgerEntry> {
        let conn = SqliteLedgerRepository::lock(&ledger.conn).unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, source_path, dest_path, file_name
                 FROM uploaded_logs WHERE file_name = ?1 ORDER BY id",
            )
            .unwrap();

        stmt.query_map(params![file_name], |row| {
            let timestamp: String = row.get(0)?;
            Ok(LedgerEntry::new(
                row.get::<_, String>(3)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                DateTime::parse_from_rfc3339(&timestamp)
                    .unwrap()
                    .with_timezone(&Utc),
            ))
        })
        .unwrap()
        .collect::<rusqlite::Result<Vec<_>>>()
        .unwrap()
    }

    #[tokio::test]
    async fn test_record_then_lookup() {
        let ledger = SqliteLedgerRepository::open_in_memory().unwrap();

        assert!(!ledger.is_transferred("CL.000005.240113").await.unwrap());
        ledger.record(&entry("CL.000005.240113")).await.unwrap();

        assert!(ledger.is_transferred("CL.000005.240113").await.unwrap());
        assert!(!ledger.is_transferred("CL.000005.240114").await.unwrap());
        assert_eq!(ledger.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_names_are_appended() {
        let ledger = SqliteLedgerRepository::open_in_memory().unwrap();

        ledger.record(&entry("A.txt")).await.unwrap();
        ledger.record(&entry("A.txt")).await.unwrap();

        assert_eq!(ledger.count().await.unwrap(), 2);
        let entries = entries_for(&ledger, "A.txt");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entry("A.txt"));
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state/routesync.db");
        let path = path.to_str().unwrap();

        {
            let ledger = SqliteLedgerRepository::open(path).unwrap();
            ledger.record(&entry("TT_report_16012024.csv")).await.unwrap();
        }

        let reopened = SqliteLedgerRepository::open(path).unwrap();
        assert!(reopened
            .is_transferred("TT_report_16012024.csv")
            .await
            .unwrap());
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_records_are_serialized() {
        let ledger = Arc::new(SqliteLedgerRepository::open_in_memory().unwrap());

        let mut handles = Vec::new();
        for i in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.record(&entry(&format!("F{}", i))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(ledger.count().await.unwrap(), 16);
    }

    #[test]
    fn test_open_unwritable_path_fails() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not_a_dir");
        fs::write(&blocker, "x").unwrap();

        let path = blocker.join("ledger.db");
        assert!(SqliteLedgerRepository::open(path.to_str().unwrap()).is_err());
    }
}
