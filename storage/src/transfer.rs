//! Transfer (C5, §4.5): streams remote files into the local cache
//! idempotently, with resume, bounded parallelism and retry.

use crate::cache::{LocalCache, ManifestEntry, PartitionManifest, LOCK_FILE_NAME, MANIFEST_FILE_NAME};
use crate::discovery;
use bytes::Bytes;
use curlake_core::{DataSourceConfig, EngineConfig, Error, FileLocation, FileReference, Partition, Result};
use futures::stream::{self, StreamExt};
use object_store::path::Path as StorePath;
use object_store::ObjectStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_retry2::strategy::{jitter, ExponentialBackoff};
use tokio_retry2::RetryError;
use uuid::Uuid;

/// One file's transfer outcome.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Transferred { bytes: u64 },
    Skipped,
    Failed { message: String },
}

/// `sync(config, options) → report` (§4.5).
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub transferred: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub total_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub worker_pool_size: usize,
    pub retry_max_attempts: usize,
    pub retry_base_delay: std::time::Duration,
    pub retry_max_delay: std::time::Duration,
}

impl SyncOptions {
    pub fn from_engine_config(engine: &EngineConfig) -> Self {
        Self {
            worker_pool_size: engine.transfer_worker_pool_size,
            retry_max_attempts: engine.retry_max_attempts,
            retry_base_delay: engine.retry_base_delay,
            retry_max_delay: engine.retry_max_delay,
        }
    }
}

/// Guards "two concurrent sync runs over the same config are disallowed"
/// (§5) via a file-system advisory lock at the cache root.
struct SyncLock {
    path: PathBuf,
}

impl SyncLock {
    fn acquire(local_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(local_root).map_err(|e| Error::io(local_root, e))?;
        let path = local_root.join(LOCK_FILE_NAME);
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    Error::Conflict(format!("a sync is already running for {}", local_root.display()))
                }
                _ => Error::io(&path, e),
            })?;
        Ok(Self { path })
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub async fn sync(
    config: &DataSourceConfig,
    store: &Arc<dyn ObjectStore>,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let Some(local_root) = config.local_root.clone() else {
        return Err(Error::Config("sync requires local_root to be set".into()));
    };
    let _lock = SyncLock::acquire(&local_root)?;

    let discovered = discovery::list(config, store).await?;
    tracing::info!(
        table = %config.table_name,
        files = discovered.files.len(),
        skipped_partitions = discovered.skipped_partitions,
        "transfer: starting sync"
    );

    let by_partition = group_by_partition(&discovered.files);

    let results: Vec<(String, FileOutcome)> = stream::iter(discovered.files.iter().cloned())
        .map(|file| {
            let local_root = local_root.clone();
            let prefix = config.prefix.clone();
            let store = store.clone();
            let options = options.clone();
            async move {
                let name = file.object_name().to_string();
                let started = Instant::now();
                let outcome = transfer_one(&local_root, &prefix, &file, &store, &options).await;
                tracing::debug!(
                    file = %name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "transfer: file complete"
                );
                (name, outcome)
            }
        })
        .buffer_unordered(options.worker_pool_size.max(1))
        .collect()
        .await;

    let mut report = SyncReport::default();
    for (name, outcome) in results {
        match outcome {
            FileOutcome::Transferred { bytes } => {
                report.total_bytes += bytes;
                report.transferred.push(name);
            }
            FileOutcome::Skipped => report.skipped.push(name),
            FileOutcome::Failed { message } => report.failed.push((name, message)),
        }
    }

    for (partition, files) in by_partition {
        write_manifest(&local_root, &partition, &files)?;
    }

    tracing::info!(
        table = %config.table_name,
        transferred = report.transferred.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        bytes = report.total_bytes,
        "transfer: sync complete"
    );
    Ok(report)
}

fn group_by_partition(files: &[FileReference]) -> HashMap<Partition, Vec<&FileReference>> {
    let mut map: HashMap<Partition, Vec<&FileReference>> = HashMap::new();
    for file in files {
        map.entry(file.partition).or_default().push(file);
    }
    map
}

fn write_manifest(local_root: &Path, partition: &Partition, files: &[&FileReference]) -> Result<()> {
    let dir = local_root.join(partition.key_segment());
    let entries: Vec<ManifestEntry> = files
        .iter()
        .filter_map(|f| {
            let size = f.size_bytes?;
            Some(ManifestEntry {
                name: f.object_name().to_string(),
                size_bytes: size,
            })
        })
        .collect();
    let manifest = PartitionManifest { files: entries };
    let body = serde_json::to_string(&manifest)
        .map_err(|e| Error::Internal(format!("failed to serialize cache manifest: {e}")))?;
    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    let tmp_path = dir.join(format!(".tmp-{}", Uuid::new_v4()));
    std::fs::write(&tmp_path, body).map_err(|e| Error::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, &manifest_path).map_err(|e| Error::io(&manifest_path, e))
}

async fn transfer_one(
    local_root: &Path,
    prefix: &str,
    file: &FileReference,
    store: &Arc<dyn ObjectStore>,
    options: &SyncOptions,
) -> FileOutcome {
    let dest = LocalCache::path_for(local_root, prefix, file);
    if let Some(expected_size) = file.size_bytes {
        if let Ok(meta) = std::fs::metadata(&dest) {
            if meta.len() == expected_size {
                return FileOutcome::Skipped;
            }
        }
    }

    let FileLocation::Remote(key) = &file.location else {
        return FileOutcome::Failed {
            message: "transfer source must be a remote file reference".into(),
        };
    };
    let store_path = StorePath::from(key.trim_matches('/'));

    let retry_strategy = ExponentialBackoff::from_millis(options.retry_base_delay.as_millis().max(1) as u64)
        .max_delay(options.retry_max_delay)
        .map(jitter)
        .take(options.retry_max_attempts);

    let result = tokio_retry2::Retry::spawn(retry_strategy, || {
        let store = store.clone();
        let store_path = store_path.clone();
        async move { fetch(&store, &store_path).await }
    })
    .await;

    match result {
        Ok(bytes) => match stage_then_rename(&dest, &bytes) {
            Ok(()) => FileOutcome::Transferred { bytes: bytes.len() as u64 },
            Err(e) => FileOutcome::Failed { message: e.to_string() },
        },
        Err(e) => FileOutcome::Failed { message: e.to_string() },
    }
}

async fn fetch(store: &Arc<dyn ObjectStore>, path: &StorePath) -> std::result::Result<Bytes, RetryError<String>> {
    match store.get(path).await {
        Ok(result) => result
            .bytes()
            .await
            .map_err(|e| RetryError::transient(e.to_string())),
        Err(e @ object_store::Error::NotFound { .. }) => Err(RetryError::permanent(e.to_string())),
        Err(e) => Err(RetryError::transient(e.to_string())),
    }
}

fn stage_then_rename(dest: &Path, bytes: &Bytes) -> Result<()> {
    let dir = dest.parent().ok_or_else(|| Error::Internal("destination has no parent directory".into()))?;
    std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let tmp_path = dir.join(format!(".tmp-{}", Uuid::new_v4()));
    std::fs::write(&tmp_path, bytes).map_err(|e| Error::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, dest).map_err(|e| Error::io(dest, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use curlake_core::{DataSourceConfig, ExportType, Partition, PartitionValue};
    use object_store::memory::InMemory;

    fn config(bucket_root: &Path) -> DataSourceConfig {
        DataSourceConfig::builder("bucket", "exports", ExportType::CurParquet)
            .local_root(bucket_root.join("cache"))
            .build()
            .unwrap()
    }

    async fn seeded_store() -> Arc<dyn ObjectStore> {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        store
            .put(
                &StorePath::from("exports/billing_period=2025-05/part-0.parquet"),
                Bytes::from_static(b"parquet-bytes").into(),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn sync_writes_files_and_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let store = seeded_store().await;
        let options = SyncOptions {
            worker_pool_size: 2,
            retry_max_attempts: 1,
            retry_base_delay: std::time::Duration::from_millis(1),
            retry_max_delay: std::time::Duration::from_millis(10),
        };
        let report = sync(&cfg, &store, &options).await.unwrap();
        assert_eq!(report.transferred.len(), 1);
        assert!(report.failed.is_empty());

        let partition = Partition::new(
            ExportType::CurParquet,
            PartitionValue::parse("2025-05", curlake_core::Granularity::Monthly).unwrap(),
        );
        let status = LocalCache::status(&cfg).unwrap();
        assert!(status.get(&partition).unwrap().complete);
    }

    #[tokio::test]
    async fn second_concurrent_sync_conflicts_test() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let local_root = cfg.local_root.clone().unwrap();
        let _lock = SyncLock::acquire(&local_root).unwrap();
        let store = seeded_store().await;
        let options = SyncOptions {
            worker_pool_size: 1,
            retry_max_attempts: 1,
            retry_base_delay: std::time::Duration::from_millis(1),
            retry_max_delay: std::time::Duration::from_millis(10),
        };
        let err = sync(&cfg, &store, &options).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn resync_skips_unchanged_files() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let store = seeded_store().await;
        let options = SyncOptions {
            worker_pool_size: 1,
            retry_max_attempts: 1,
            retry_base_delay: std::time::Duration::from_millis(1),
            retry_max_delay: std::time::Duration::from_millis(10),
        };
        sync(&cfg, &store, &options).await.unwrap();
        let report = sync(&cfg, &store, &options).await.unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert!(report.transferred.is_empty());
    }
}
