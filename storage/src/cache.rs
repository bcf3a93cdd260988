//! Local cache (C4, §4.4): a mirror of the remote layout on disk. On-disk
//! layout mirrors the remote key suffix exactly; writers stage then rename
//! (§4.5) so a partially-written file is never visible under its final name.

use curlake_core::{ContentFormat, DataSourceConfig, Error, FileLocation, FileReference, Partition, PartitionValue, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The name of the per-partition manifest written by C5 after a successful
/// sync, used to determine completeness without a hash check (§3).
pub const MANIFEST_FILE_NAME: &str = ".curlake-manifest.json";

/// The hidden marker file at the cache root holding the advisory lock (§5, §6).
pub const LOCK_FILE_NAME: &str = ".curlake.lock";

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PartitionManifest {
    pub files: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ManifestEntry {
    pub name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionStatus {
    pub file_count: usize,
    pub total_bytes: u64,
    pub complete: bool,
}

pub struct LocalCache;

impl LocalCache {
    /// `<local_root>/<path-relative-to-prefix>` (§6).
    pub fn path_for(local_root: &Path, prefix: &str, file: &FileReference) -> PathBuf {
        let relative = match &file.location {
            FileLocation::Remote(key) => key
                .strip_prefix(prefix.trim_matches('/'))
                .unwrap_or(key)
                .trim_start_matches('/')
                .to_string(),
            FileLocation::Local(path) => path.to_string_lossy().to_string(),
        };
        local_root.join(relative)
    }

    fn partition_dir(local_root: &Path, partition: &Partition) -> PathBuf {
        local_root.join(partition.key_segment())
    }

    /// `status(config) → {partition → {file_count, total_bytes, complete?}}` (§4.4).
    pub fn status(config: &DataSourceConfig) -> Result<HashMap<Partition, PartitionStatus>> {
        let Some(local_root) = &config.local_root else {
            return Ok(HashMap::new());
        };
        let mut out = HashMap::new();
        if !local_root.exists() {
            return Ok(out);
        }
        let partitions = partitions_on_disk(local_root, config)?;
        tracing::debug!(
            local_root = %local_root.display(),
            partitions_considered = partitions.len(),
            "cache: status scan starting"
        );
        for partition in partitions {
            let dir = Self::partition_dir(local_root, &partition);
            let (file_count, total_bytes) = count_partition_files(&dir, config)?;
            let complete = manifest_matches_disk(&dir, config)?;
            if !complete {
                tracing::debug!(
                    partition = %partition.key_segment(),
                    file_count,
                    "cache: partition incomplete"
                );
            }
            out.insert(
                partition,
                PartitionStatus {
                    file_count,
                    total_bytes,
                    complete,
                },
            );
        }
        Ok(out)
    }

    /// `list_files(config) → ordered file references` — same ordering rule as C3.
    pub fn list_files(config: &DataSourceConfig) -> Result<Vec<FileReference>> {
        let Some(local_root) = &config.local_root else {
            return Ok(Vec::new());
        };
        let mut partitions = partitions_on_disk(local_root, config)?;
        partitions.sort();
        let mut out = Vec::new();
        for partition in partitions {
            let dir = Self::partition_dir(local_root, &partition);
            let mut entries = list_partition_files(&dir, config)?;
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, format, size) in entries {
                out.push(FileReference::new(
                    FileLocation::Local(dir.join(&name)),
                    partition,
                    format,
                    Some(size),
                ));
            }
        }
        tracing::debug!(
            local_root = %local_root.display(),
            files = out.len(),
            "cache: list_files complete"
        );
        Ok(out)
    }

    /// `is_usable(config) → bool`: true iff the local root exists and
    /// contains at least one partition matching the current window.
    pub fn is_usable(config: &DataSourceConfig) -> bool {
        let Some(local_root) = &config.local_root else {
            return false;
        };
        if !local_root.exists() {
            return false;
        }
        let usable = partitions_on_disk(local_root, config)
            .map(|p| !p.is_empty())
            .unwrap_or(false);
        tracing::debug!(local_root = %local_root.display(), usable, "cache: usability check");
        usable
    }
}

fn partitions_on_disk(local_root: &Path, config: &DataSourceConfig) -> Result<Vec<Partition>> {
    let token_prefix = format!("{}=", config.export_type.partition_token());
    let granularity = config.export_type.granularity();
    let mut out = Vec::new();
    let entries = match std::fs::read_dir(local_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(Error::io(local_root, e)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(local_root, e))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(value_str) = name.strip_prefix(&token_prefix) else {
            continue;
        };
        if let Ok(value) = PartitionValue::parse(value_str, granularity) {
            if in_window(value, config.date_start, config.date_end) {
                out.push(Partition::new(config.export_type, value));
            }
        }
    }
    Ok(out)
}

fn in_window(value: PartitionValue, start: Option<PartitionValue>, end: Option<PartitionValue>) -> bool {
    if let Some(start) = start {
        if value < start {
            return false;
        }
    }
    if let Some(end) = end {
        if value > end {
            return false;
        }
    }
    true
}

fn list_partition_files(dir: &Path, config: &DataSourceConfig) -> Result<Vec<(String, ContentFormat, u64)>> {
    let mut out = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(Error::io(dir, e)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name == MANIFEST_FILE_NAME || name == LOCK_FILE_NAME || name.starts_with(".tmp-") {
            continue;
        }
        let Some(format) = config.export_type.classify_file(&name) else {
            continue;
        };
        let meta = entry.metadata().map_err(|e| Error::io(dir, e))?;
        out.push((name, format, meta.len()));
    }
    Ok(out)
}

fn count_partition_files(dir: &Path, config: &DataSourceConfig) -> Result<(usize, u64)> {
    let files = list_partition_files(dir, config)?;
    let total_bytes = files.iter().map(|(_, _, size)| *size).sum();
    Ok((files.len(), total_bytes))
}

fn manifest_matches_disk(dir: &Path, config: &DataSourceConfig) -> Result<bool> {
    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    let manifest = match std::fs::read_to_string(&manifest_path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io(&manifest_path, e)),
    };
    let manifest: PartitionManifest = serde_json::from_str(&manifest)
        .map_err(|e| Error::Internal(format!("corrupt cache manifest {}: {e}", manifest_path.display())))?;
    let on_disk = list_partition_files(dir, config)?;
    if on_disk.len() != manifest.files.len() {
        return Ok(false);
    }
    let mut disk_sizes: HashMap<&str, u64> = HashMap::new();
    for (name, _, size) in &on_disk {
        disk_sizes.insert(name.as_str(), *size);
    }
    for expected in &manifest.files {
        match disk_sizes.get(expected.name.as_str()) {
            Some(size) if *size == expected.size_bytes => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use curlake_core::ExportType;

    fn config(root: &Path) -> DataSourceConfig {
        DataSourceConfig::builder("bucket", "exports", ExportType::CurParquet)
            .local_root(root)
            .build()
            .unwrap()
    }

    #[test]
    fn is_usable_requires_existing_root_with_partitions() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        assert!(!LocalCache::is_usable(&cfg));
        std::fs::create_dir_all(tmp.path().join("billing_period=2025-05")).unwrap();
        assert!(LocalCache::is_usable(&cfg));
    }

    #[test]
    fn incomplete_without_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let part_dir = tmp.path().join("billing_period=2025-05");
        std::fs::create_dir_all(&part_dir).unwrap();
        std::fs::write(part_dir.join("part-0.parquet"), b"data").unwrap();
        let status = LocalCache::status(&cfg).unwrap();
        let entry = status.values().next().unwrap();
        assert_eq!(entry.file_count, 1);
        assert!(!entry.complete);
    }

    #[test]
    fn complete_when_manifest_matches_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let part_dir = tmp.path().join("billing_period=2025-05");
        std::fs::create_dir_all(&part_dir).unwrap();
        std::fs::write(part_dir.join("part-0.parquet"), b"data").unwrap();
        let manifest = PartitionManifest {
            files: vec![ManifestEntry {
                name: "part-0.parquet".into(),
                size_bytes: 4,
            }],
        };
        std::fs::write(
            part_dir.join(MANIFEST_FILE_NAME),
            serde_json::to_string(&manifest).unwrap(),
        )
        .unwrap();
        let status = LocalCache::status(&cfg).unwrap();
        let entry = status.values().next().unwrap();
        assert!(entry.complete);
    }
}
