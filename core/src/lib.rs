//! Data model, configuration and error envelope shared by every crate in the
//! cost-analytics query engine (see SPEC_FULL.md §3, §4.1-§4.2, §4.13-§4.14).

pub mod config;
pub mod error;
pub mod export_type;
pub mod file_ref;
pub mod frame;
pub mod partition;
pub mod partition_layout;

pub use config::{CredentialBundle, CredentialMethod, DataSourceConfig, EngineConfig};
pub use error::{Error, Result};
pub use export_type::{ContentFormat, ExportType};
pub use file_ref::{FileLocation, FileReference};
pub use frame::{Cell, Column, ResultFrame};
pub use partition::{Granularity, Partition, PartitionValue};
