//! Partition-aware discovery, local caching and transfer (C1, C3-C5).

pub mod cache;
pub mod credentials;
pub mod discovery;
pub mod transfer;

pub use cache::{LocalCache, PartitionStatus};
pub use credentials::ClientProvider;
pub use discovery::DiscoveryResult;
pub use transfer::{sync, FileOutcome, SyncOptions, SyncReport};
