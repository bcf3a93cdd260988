//! A cost-analytics query engine over AWS Cost-and-Usage-Report exports.
//!
//! Tenants point this crate at an object-store prefix holding partitioned
//! CUR files. It discovers partitions, optionally mirrors them to a local
//! cache, and answers SQL queries through a pluggable engine adapter. A
//! dependency-ordered materializer builds derived views from the raw export.

pub use datafusion;
pub use object_store;

pub mod core {
    pub use curlake_core::*;
}

pub mod storage {
    pub use curlake_storage::*;
}

pub mod query {
    pub use curlake_query::*;
}

pub mod views {
    pub use curlake_views::*;
}

/// Initializes process-wide structured logging (C12). Reads `RUST_LOG`
/// through `EnvFilter`; falls back to `info` when unset.
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
