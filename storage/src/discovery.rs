//! Remote discovery (C3, §4.3): lists partitions under a configured prefix,
//! filters by the date window, and emits the concrete file set. The object
//! store is the single source of truth — no caching of listings across
//! calls.

use curlake_core::{DataSourceConfig, Error, FileLocation, FileReference, Partition, PartitionValue, Result};
use object_store::{path::Path as StorePath, ObjectStore};
use std::sync::Arc;

/// Result of a remote listing: the ordered file set plus a diagnostic count
/// of partition directories that failed to parse and were silently skipped
/// (§4.3 edge cases).
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    pub files: Vec<FileReference>,
    pub skipped_partitions: usize,
}

/// Lists the file set for `config` against `store`, ordered
/// (partition-ascending, object-name-ascending).
pub async fn list(config: &DataSourceConfig, store: &Arc<dyn ObjectStore>) -> Result<DiscoveryResult> {
    let granularity = config.export_type.granularity();
    let prefix_path = StorePath::from(config.prefix.trim_matches('/'));
    let listing = store
        .list_with_delimiter(Some(&prefix_path))
        .await
        .map_err(|e| Error::object_store(config.prefix.clone(), e))?;

    let mut retained: Vec<Partition> = Vec::new();
    let mut skipped_partitions = 0usize;
    let token_prefix = format!("{}=", config.export_type.partition_token());

    for dir in &listing.common_prefixes {
        let Some(segment) = dir.as_ref().rsplit('/').find(|s| !s.is_empty()) else {
            continue;
        };
        let Some(value_str) = segment.strip_prefix(&token_prefix) else {
            // Not a partition directory for this export type; ignore quietly.
            continue;
        };
        match PartitionValue::parse(value_str, granularity) {
            Ok(value) => {
                if in_window(value, config.date_start, config.date_end) {
                    retained.push(Partition::new(config.export_type, value));
                }
            }
            Err(_) => {
                skipped_partitions += 1;
            }
        }
    }
    retained.sort();
    tracing::debug!(
        prefix = %config.prefix,
        partitions_considered = listing.common_prefixes.len(),
        partitions_kept = retained.len(),
        partitions_skipped = skipped_partitions,
        "discovery: partitions filtered by window"
    );

    let mut files = Vec::new();
    for partition in retained {
        let partition_prefix = StorePath::from(format!(
            "{}/{}",
            config.prefix.trim_matches('/'),
            partition.key_segment()
        ));
        let part_listing = store
            .list_with_delimiter(Some(&partition_prefix))
            .await
            .map_err(|e| Error::object_store(partition_prefix.to_string(), e))?;
        let mut names: Vec<(String, object_store::ObjectMeta)> = part_listing
            .objects
            .into_iter()
            .filter_map(|meta| {
                let name = meta.location.as_ref().rsplit('/').next()?.to_string();
                Some((name, meta))
            })
            .collect();
        names.sort_by(|a, b| a.0.cmp(&b.0));
        let mut kept_in_partition = 0usize;
        for (name, meta) in names {
            let Some(format) = config.export_type.classify_file(&name) else {
                continue;
            };
            files.push(FileReference::new(
                FileLocation::Remote(meta.location.to_string()),
                partition,
                format,
                Some(meta.size as u64),
            ));
            kept_in_partition += 1;
        }
        tracing::debug!(
            partition = %partition.key_segment(),
            files_kept = kept_in_partition,
            "discovery: partition listed"
        );
    }

    tracing::info!(
        prefix = %config.prefix,
        files_total = files.len(),
        partitions_skipped = skipped_partitions,
        "discovery: listing complete"
    );
    Ok(DiscoveryResult {
        files,
        skipped_partitions,
    })
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

/// Exposed for C4/C9 callers that need to know the granularity-appropriate
/// partition key token without re-deriving it from `ExportType` themselves.
pub fn partition_key_token(config: &DataSourceConfig) -> &'static str {
    config.export_type.partition_token()
}
