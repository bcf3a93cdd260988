//! File references (§3): a file belongs to exactly one partition.

use crate::export_type::ContentFormat;
use crate::partition::Partition;
use std::path::PathBuf;

/// Where a file physically lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileLocation {
    /// An object-store key, relative to the data-source's configured prefix
    /// (e.g. `billing_period=2025-05/part-0.parquet`).
    Remote(String),
    /// A path on the local cache filesystem.
    Local(PathBuf),
}

/// Tuple of (location, partition, content format, known byte size).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileReference {
    pub location: FileLocation,
    pub partition: Partition,
    pub format: ContentFormat,
    pub size_bytes: Option<u64>,
}

impl FileReference {
    pub fn new(
        location: FileLocation,
        partition: Partition,
        format: ContentFormat,
        size_bytes: Option<u64>,
    ) -> Self {
        Self {
            location,
            partition,
            format,
            size_bytes,
        }
    }

    /// The file name, independent of location (used for ordering, §4.3/§4.4).
    pub fn object_name(&self) -> &str {
        let full = match &self.location {
            FileLocation::Remote(key) => key.as_str(),
            FileLocation::Local(path) => path.to_str().unwrap_or_default(),
        };
        full.rsplit('/').next().unwrap_or(full)
    }
}
