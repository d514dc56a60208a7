//! JSON Ledger Repository Implementation
//!
//! LedgerRepositoryのJSON実装（台帳エントリの一覧をJSONファイルで永続化）

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};

use crate::domain::entities::ledger_entry::LedgerEntry;
use crate::domain::repositories::ledger_repository::LedgerRepository;

/// 台帳ファイル（JSON永続化用の内部表現）
#[derive(Debug, Default, Deserialize, Serialize)]
struct LedgerFileJson {
    entries: Vec<LedgerEntry>,
}

/// メモリ上の台帳（エントリ一覧とファイル名の索引）
#[derive(Debug, Default)]
struct LedgerState {
    file: LedgerFileJson,
    names: HashSet<String>,
}

impl From<LedgerFileJson> for LedgerState {
    fn from(file: LedgerFileJson) -> Self {
        let names = file
            .entries
            .iter()
            .map(|entry| entry.file_name.clone())
            .collect();
        Self { file, names }
    }
}

/// JSONファイルベースの台帳リポジトリ
///
/// 全エントリをメモリに保持し、記録のたびにファイル全体を書き直す。
/// 書き込みは一時ファイルへの書き込みとリネームで行う。
/// 記録のコストが台帳の大きさに比例するため、小さな台帳向け（大きな台帳はSQLiteを使う）
pub struct JsonLedgerRepository {
    path: PathBuf,
    state: Arc<Mutex<LedgerState>>,
}

impl JsonLedgerRepository {
    /// 台帳を開く（なければ空の台帳として扱う）
    ///
    /// # Errors
    ///
    /// ファイルが読めない、またはJSONとして解釈できない場合にエラーを返す
    pub fn open(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path);
        let path = PathBuf::from(expanded.as_ref());
        let state = Self::load_sync(&path)?;

        info!(
            target: "routesync::ledger",
            "Opened JSON ledger at {} ({} entries)",
            path.display(),
            state.entries.len()
        );

        Ok(Self {
            path,
            state: Arc::new(Mutex::new(LedgerState::from(state))),
        })
    }

    /// ファイルから台帳を読み込む（同期処理）
    fn load_sync(path: &Path) -> Result<LedgerFileJson> {
        if !path.exists() {
            return Ok(LedgerFileJson::default());
        }

        let content = fs::read_to_string(path).context("Failed to read ledger file")?;
        serde_json::from_str(&content).context("Failed to parse ledger JSON")
    }

    /// 台帳をファイルに保存する（同期処理）
    fn save_sync(path: &Path, state: &LedgerFileJson) -> Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).context("Failed to create ledger directory")?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ledger.json".to_string());
        let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let json = serde_json::to_string_pretty(state).context("Failed to serialize ledger")?;
        fs::write(&temp_path, json).context("Failed to write ledger temp file")?;
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e).context("Failed to replace ledger file");
        }

        Ok(())
    }

    fn record_sync(path: &Path, state: &Mutex<LedgerState>, entry: LedgerEntry) -> Result<()> {
        let mut state = state
            .lock()
            .map_err(|_| anyhow::anyhow!("Ledger lock poisoned"))?;

        let file_name = entry.file_name.clone();
        state.file.entries.push(entry);
        if let Err(e) = Self::save_sync(path, &state.file) {
            // ディスクに書けなかったエントリはメモリからも外す
            state.file.entries.pop();
            return Err(e);
        }
        state.names.insert(file_name);
        Ok(())
    }

    fn with_state<T>(&self, f: impl FnOnce(&LedgerState) -> T) -> Result<T> {
        let state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("Ledger lock poisoned"))?;
        Ok(f(&state))
    }
}

#[async_trait]
impl LedgerRepository for JsonLedgerRepository {
    async fn is_transferred(&self, file_name: &str) -> Result<bool> {
        self.with_state(|state| state.names.contains(file_name))
    }

    async fn record(&self, entry: &LedgerEntry) -> Result<()> {
        let path = self.path.clone();
        let state = Arc::clone(&self.state);
        let entry = entry.clone();
        tokio::task::spawn_blocking(move || Self::record_sync(&path, &state, entry))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to spawn blocking task: {}", e))?
    }

    async fn count(&self) -> Result<u64> {
        self.with_state(|state| state.file.entries.len() as u64)
    }
}
