//! # Transfer Files Use Case
//!
//! 同時実行数を制限したファイル転送
//!
//! ## 処理フロー
//!
//! 1. キャンセルされていなければスロット（セマフォのpermit）を取得
//! 2. 接続プールからエンドポイント接続を1つ借りる
//! 3. `spawn_blocking` 上でソースを開き、転送先へコピー
//! 4. 結果をチャネルへ送り、スロットを返す
//!
//! 1ファイルの失敗は他のファイルの転送を妨げない。

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::domain::entities::file_record::SourceKind;
use crate::domain::entities::routed_file::RoutedFile;
use crate::domain::entities::transfer_outcome::{
    FailedTransfer, TransferOutcome, TransferReport, TransferredFile,
};
use crate::domain::errors::{error_chain_to_string, error_sources_to_string, SyncError};
use crate::domain::repositories::remote_endpoint::{EndpointFactory, RemoteEndpoint};

/// エンドポイント接続のプール
///
/// 接続は必要になった時点で作成し、転送に成功した接続だけをプールに戻す。
/// スロット数を超える接続が同時に使われることはない。
struct EndpointPool {
    factory: Arc<dyn EndpointFactory>,
    idle: Mutex<Vec<Box<dyn RemoteEndpoint>>>,
}

impl EndpointPool {
    fn new(factory: Arc<dyn EndpointFactory>) -> Self {
        Self {
            factory,
            idle: Mutex::new(Vec::new()),
        }
    }

    async fn checkout(&self) -> anyhow::Result<Box<dyn RemoteEndpoint>> {
        if let Some(endpoint) = self.idle.lock().await.pop() {
            return Ok(endpoint);
        }
        debug!(
            target: "routesync::transfer",
            "Opening connection to {}",
            self.factory.describe()
        );
        self.factory.connect().await
    }

    async fn checkin(&self, endpoint: Box<dyn RemoteEndpoint>) {
        self.idle.lock().await.push(endpoint);
    }
}

/// 1ファイルをコピーする
///
/// ローカルのソースはファイルシステムから、リモートのソースは同じ接続から読む。
///
/// # Returns
///
/// 書き込んだバイト数
pub fn copy_file(endpoint: &dyn RemoteEndpoint, file: &RoutedFile) -> io::Result<u64> {
    let mut source: Box<dyn Read + Send> = match file.file().source_kind {
        SourceKind::Local => Box::new(BufReader::new(File::open(file.source_location())?)),
        SourceKind::Remote => endpoint.open_for_read(file.source_location())?,
    };
    endpoint.create_and_write(file.destination_path(), &mut source)
}

async fn transfer_one(pool: &EndpointPool, file: RoutedFile) -> TransferOutcome {
    info!(
        target: "routesync::transfer",
        "[TRANSFER/START] {} -> {}",
        file.name(),
        file.destination_path()
    );

    let endpoint = match pool.checkout().await {
        Ok(endpoint) => endpoint,
        Err(e) => {
            let reason = error_chain_to_string(&e);
            error!(
                target: "routesync::transfer",
                "[TRANSFER/FAILED] {}: endpoint unavailable: {}",
                file.name(),
                reason
            );
            return TransferOutcome::Failed(FailedTransfer {
                file,
                error: SyncError::Endpoint { reason },
            });
        }
    };

    let task_file = file.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let result = copy_file(endpoint.as_ref(), &task_file);
        (endpoint, result)
    })
    .await;

    let source = match joined {
        Ok((endpoint, Ok(bytes))) => {
            pool.checkin(endpoint).await;
            info!(
                target: "routesync::transfer",
                "[TRANSFER/SUCCESS] {} ({} bytes)",
                file.name(),
                bytes
            );
            return TransferOutcome::Succeeded(TransferredFile { file, bytes });
        }
        // 失敗した接続は状態が不明なので再利用しない
        Ok((_endpoint, Err(e))) => e,
        Err(join_error) => io::Error::other(format!("transfer worker died: {}", join_error)),
    };

    let error = SyncError::Transfer {
        file_name: file.name().to_string(),
        destination: file.destination_path().to_string(),
        source,
    };
    error!(
        target: "routesync::transfer",
        "[TRANSFER/FAILED] {}",
        error_sources_to_string(&error)
    );
    TransferOutcome::Failed(FailedTransfer { file, error })
}

/// ファイル転送ユースケース
///
/// 1つの転送先クラスのファイル群を、最大 `max_concurrency` 件ずつ並行して転送する
pub struct TransferFilesUseCase {
    pool: Arc<EndpointPool>,
    max_concurrency: usize,
}

impl TransferFilesUseCase {
    /// 新しいユースケースを作成
    ///
    /// # Arguments
    ///
    /// * `endpoint_factory` - 接続の作成元
    /// * `max_concurrency` - 同時転送数の上限（0は1として扱う）
    pub fn new(endpoint_factory: Arc<dyn EndpointFactory>, max_concurrency: usize) -> Self {
        Self {
            pool: Arc::new(EndpointPool::new(endpoint_factory)),
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// 転送を開始し、完了した順に結果を流すチャネルを返す
    ///
    /// 全ファイルの結果（成功・失敗・スキップ）を送り終えるとチャネルが閉じる。
    /// キャンセル後はスロットを取得せず、未開始のファイルを `Skipped` として送る。
    /// 実行中のコピーは最後まで続ける。
    pub fn spawn(
        &self,
        files: Vec<RoutedFile>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<TransferOutcome> {
        let (tx, rx) = mpsc::channel(self.max_concurrency * 2);
        let slots = Arc::new(Semaphore::new(self.max_concurrency));
        let pool = Arc::clone(&self.pool);

        tokio::spawn(async move {
            let mut workers = JoinSet::new();

            for file in files {
                let permit = if cancel.is_cancelled() {
                    None
                } else {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        permit = Arc::clone(&slots).acquire_owned() => permit.ok(),
                    }
                };

                let Some(permit) = permit else {
                    warn!(target: "routesync::transfer", "[TRANSFER/SKIPPED] {}", file.name());
                    if tx.send(TransferOutcome::Skipped(file)).await.is_err() {
                        break;
                    }
                    continue;
                };

                let pool = Arc::clone(&pool);
                let tx = tx.clone();
                workers.spawn(async move {
                    let outcome = transfer_one(&pool, file).await;
                    drop(permit);
                    let _ = tx.send(outcome).await;
                });
            }

            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    error!(target: "routesync::transfer", "Transfer worker aborted: {}", e);
                }
            }
        });

        rx
    }

    /// 全ファイルを転送し、結果をまとめて返す
    ///
    /// グループ全体として失敗することはない
    pub async fn execute(&self, files: Vec<RoutedFile>, cancel: CancellationToken) -> TransferReport {
        let mut rx = self.spawn(files, cancel);
        let mut report = TransferReport::new();
        while let Some(outcome) = rx.recv().await {
            report.push(outcome);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::domain::entities::file_record::FileRecord;
    use crate::domain::entities::routed_file::DestinationClass;
    use crate::domain::repositories::remote_endpoint::RemoteEntry;

    #[derive(Default)]
    struct Shared {
        sources: HashMap<String, Vec<u8>>,
        fail_on: HashSet<String>,
        panic_on: HashSet<String>,
        written: std::sync::Mutex<HashMap<String, Vec<u8>>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        connections: AtomicUsize,
        cancel_after_write: Option<CancellationToken>,
    }

    struct MemoryEndpoint {
        shared: Arc<Shared>,
    }

    impl RemoteEndpoint for MemoryEndpoint {
        fn list_directory(&self, _path: &str) -> io::Result<Vec<RemoteEntry>> {
            Ok(vec![])
        }

        fn create_and_write(&self, path: &str, source: &mut dyn Read) -> io::Result<u64> {
            let now = self.shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.shared.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));

            let result = if self.shared.panic_on.contains(path) {
                self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("simulated crash writing {}", path);
            } else if self.shared.fail_on.contains(path) {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied"))
            } else {
                let mut buf = Vec::new();
                source.read_to_end(&mut buf)?;
                let len = buf.len() as u64;
                self.shared
                    .written
                    .lock()
                    .unwrap()
                    .insert(path.to_string(), buf);
                Ok(len)
            };

            if let Some(token) = &self.shared.cancel_after_write {
                token.cancel();
            }
            self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }

        fn open_for_read(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
            match self.shared.sources.get(path) {
                Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
                None => Err(io::Error::new(io::ErrorKind::NotFound, "No such file")),
            }
        }
    }

    struct MemoryFactory {
        shared: Arc<Shared>,
        refuse: bool,
    }

    #[async_trait]
    impl EndpointFactory for MemoryFactory {
        async fn connect(&self) -> anyhow::Result<Box<dyn RemoteEndpoint>> {
            if self.refuse {
                anyhow::bail!("Connection refused");
            }
            self.shared.connections.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MemoryEndpoint {
                shared: Arc::clone(&self.shared),
            }))
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    fn routed(name: &str) -> RoutedFile {
        let record = FileRecord::new(name, format!("/in/{}", name), SourceKind::Remote).unwrap();
        RoutedFile::new(record, DestinationClass::Bank, "/out".to_string()).unwrap()
    }

    fn shared_with_sources(names: &[String]) -> Shared {
        Shared {
            sources: names
                .iter()
                .map(|name| (format!("/in/{}", name), name.as_bytes().to_vec()))
                .collect(),
            ..Default::default()
        }
    }

    fn use_case(shared: &Arc<Shared>, max_concurrency: usize) -> TransferFilesUseCase {
        let factory = MemoryFactory {
            shared: Arc::clone(shared),
            refuse: false,
        };
        TransferFilesUseCase::new(Arc::new(factory), max_concurrency)
    }

    #[tokio::test]
    async fn test_at_most_n_transfers_in_flight() {
        let names: Vec<String> = (0..20).map(|i| format!("CL.{:06}.240113", i)).collect();
        let shared = Arc::new(shared_with_sources(&names));
        let use_case = use_case(&shared, 3);

        let files = names.iter().map(|name| routed(name)).collect();
        let report = use_case.execute(files, CancellationToken::new()).await;

        assert_eq!(report.succeeded.len(), 20);
        assert!(report.is_success());
        let max = shared.max_in_flight.load(Ordering::SeqCst);
        assert!(max >= 1 && max <= 3, "max in flight was {}", max);
        assert!(shared.connections.load(Ordering::SeqCst) <= 3);
        assert_eq!(shared.written.lock().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_others() {
        let names: Vec<String> = (0..5).map(|i| format!("TT_{}.csv", i)).collect();
        let mut shared = shared_with_sources(&names);
        shared.fail_on.insert("/out/TT_2.csv".to_string());
        let shared = Arc::new(shared);
        let use_case = use_case(&shared, 2);

        let files = names.iter().map(|name| routed(name)).collect();
        let report = use_case.execute(files, CancellationToken::new()).await;

        assert_eq!(report.succeeded.len(), 4);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].file.name(), "TT_2.csv");
        assert!(matches!(
            &report.failed[0].error,
            SyncError::Transfer { source, .. } if source.kind() == io::ErrorKind::PermissionDenied
        ));
        assert_eq!(report.bytes_transferred(), 4 * "TT_0.csv".len() as u64);
    }

    #[tokio::test]
    async fn test_missing_source_is_failed() {
        let shared = Arc::new(Shared::default());
        let use_case = use_case(&shared, 2);

        let report = use_case
            .execute(vec![routed("gone.txt")], CancellationToken::new())
            .await;

        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            &report.failed[0].error,
            SyncError::Transfer { source, .. } if source.kind() == io::ErrorKind::NotFound
        ));
    }

    #[tokio::test]
    async fn test_panicking_worker_is_reported_as_failed() {
        let names = vec!["A".to_string(), "B".to_string()];
        let mut shared = shared_with_sources(&names);
        shared.panic_on.insert("/out/A".to_string());
        let shared = Arc::new(shared);
        let use_case = use_case(&shared, 2);

        let files = names.iter().map(|name| routed(name)).collect();
        let report = use_case.execute(files, CancellationToken::new()).await;

        assert_eq!(report.total(), 2);
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].file.name(), "A");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_every_file() {
        let shared = Arc::new(Shared::default());
        let factory = MemoryFactory {
            shared: Arc::clone(&shared),
            refuse: true,
        };
        let use_case = TransferFilesUseCase::new(Arc::new(factory), 4);

        let report = use_case
            .execute(vec![routed("A"), routed("B")], CancellationToken::new())
            .await;

        assert_eq!(report.failed.len(), 2);
        assert!(report
            .failed
            .iter()
            .all(|failed| matches!(failed.error, SyncError::Endpoint { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_everything() {
        let shared = Arc::new(Shared::default());
        let use_case = use_case(&shared, 4);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = use_case
            .execute(vec![routed("A"), routed("B"), routed("C")], cancel)
            .await;

        assert_eq!(report.skipped.len(), 3);
        assert!(report.succeeded.is_empty());
        assert_eq!(shared.connections.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_lets_in_flight_copy_finish() {
        let names: Vec<String> = (0..4).map(|i| format!("F{}", i)).collect();
        let cancel = CancellationToken::new();
        let mut shared = shared_with_sources(&names);
        shared.cancel_after_write = Some(cancel.clone());
        let shared = Arc::new(shared);
        let use_case = use_case(&shared, 1);

        let files = names.iter().map(|name| routed(name)).collect();
        let report = use_case.execute(files, cancel).await;

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].file.name(), "F0");
        assert_eq!(report.skipped.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_group() {
        let shared = Arc::new(Shared::default());
        let use_case = use_case(&shared, 4);

        let report = use_case.execute(vec![], CancellationToken::new()).await;

        assert_eq!(report.total(), 0);
        assert_eq!(shared.connections.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let shared = Arc::new(Shared::default());
        assert_eq!(use_case(&shared, 0).max_concurrency(), 1);
    }
}
