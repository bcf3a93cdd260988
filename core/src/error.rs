//! Application error envelope (C14, §4.14). A single closed enum returned by
//! every public fallible entry point in this workspace; component-specific
//! failures are variants or wrapped sources so the C10 classifier in
//! `curlake-query` can map them to the caller-facing `ErrorKind` taxonomy
//! without re-parsing a flattened string twice.

use crate::partition::Granularity;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("object store error on {path}")]
    ObjectStore {
        path: String,
        #[source]
        source: object_store::Error,
    },

    #[error("local cache I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid partition value {value:?} for {granularity:?} granularity")]
    InvalidPartitionValue {
        value: String,
        granularity: Granularity,
    },

    #[error("{rule}: {detail}")]
    Validation { rule: String, detail: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// A raw error surfaced by the SQL engine adapter (C7), preserved
    /// verbatim for the C10 classifier. Never shown to callers directly.
    #[error("engine error: {raw}")]
    Engine { raw: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_partition_value(value: &str, granularity: Granularity) -> Self {
        Error::InvalidPartitionValue {
            value: value.to_string(),
            granularity,
        }
    }

    pub fn validation(rule: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::Validation {
            rule: rule.into(),
            detail: detail.into(),
        }
    }

    pub fn object_store(path: impl Into<String>, source: object_store::Error) -> Self {
        Error::ObjectStore {
            path: path.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
