//! Layered, immutable configuration (C13, §4.13). Both `DataSourceConfig`
//! and `EngineConfig` are built once through a validating builder and never
//! mutated afterward (§3 Lifecycle).

use crate::error::{Error, Result};
use crate::export_type::ExportType;
use crate::partition::PartitionValue;
use std::path::PathBuf;
use std::time::Duration;

/// Static (long-lived) access key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticKeys {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Temporary session credentials (e.g. already-vended STS credentials).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

/// A role to assume via STS, with an optional external id (C1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssumption {
    pub role_arn: String,
    pub external_id: Option<String>,
    pub session_name: String,
}

/// The method C1 will actually use, after applying resolution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialMethod<'a> {
    Static(&'a StaticKeys),
    Session(&'a SessionCredentials),
    Profile(&'a str),
    Role(&'a RoleAssumption),
    Ambient,
}

/// Bundles every credential-resolution input a data source may supply.
/// Resolution order, first match wins (§4.1): static keys → session
/// credentials → named profile → role assumption → ambient environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    pub static_keys: Option<StaticKeys>,
    pub session: Option<SessionCredentials>,
    pub profile: Option<String>,
    pub role: Option<RoleAssumption>,
}

impl CredentialBundle {
    pub fn ambient() -> Self {
        Self::default()
    }

    /// Applies the resolution order and returns the method that will be used.
    pub fn resolve(&self) -> CredentialMethod<'_> {
        if let Some(keys) = &self.static_keys {
            CredentialMethod::Static(keys)
        } else if let Some(session) = &self.session {
            CredentialMethod::Session(session)
        } else if let Some(profile) = &self.profile {
            CredentialMethod::Profile(profile)
        } else if let Some(role) = &self.role {
            CredentialMethod::Role(role)
        } else {
            CredentialMethod::Ambient
        }
    }

    /// A stable cache key for the client cache in C1, never containing
    /// secret material.
    pub fn cache_key(&self) -> String {
        match self.resolve() {
            CredentialMethod::Static(keys) => format!("static:{}", keys.access_key_id),
            CredentialMethod::Session(session) => format!("session:{}", session.access_key_id),
            CredentialMethod::Profile(name) => format!("profile:{name}"),
            CredentialMethod::Role(role) => format!(
                "role:{}:{}",
                role.role_arn,
                role.external_id.as_deref().unwrap_or("")
            ),
            CredentialMethod::Ambient => "ambient".to_string(),
        }
    }
}

/// Immutable per-engine-instance descriptor (§3, §6).
#[derive(Debug, Clone)]
pub struct DataSourceConfig {
    pub bucket: String,
    pub prefix: String,
    pub export_type: ExportType,
    pub table_name: String,
    pub date_start: Option<PartitionValue>,
    pub date_end: Option<PartitionValue>,
    pub local_root: Option<PathBuf>,
    pub prefer_local: bool,
    pub credentials: CredentialBundle,
    pub region: Option<String>,
    pub max_rows: u64,
    pub max_query_len: usize,
    pub query_library_root: Option<PathBuf>,
}

impl DataSourceConfig {
    pub fn builder(bucket: impl Into<String>, prefix: impl Into<String>, export_type: ExportType) -> DataSourceConfigBuilder {
        DataSourceConfigBuilder::new(bucket, prefix, export_type)
    }

    /// If `local_root` is absent, `prefer_local` is meaningless and ignored (§3 invariant).
    pub fn effective_prefer_local(&self) -> bool {
        self.prefer_local && self.local_root.is_some()
    }
}

pub struct DataSourceConfigBuilder {
    bucket: String,
    prefix: String,
    export_type: ExportType,
    table_name: Option<String>,
    date_start: Option<PartitionValue>,
    date_end: Option<PartitionValue>,
    local_root: Option<PathBuf>,
    prefer_local: bool,
    credentials: CredentialBundle,
    region: Option<String>,
    max_rows: u64,
    max_query_len: usize,
    query_library_root: Option<PathBuf>,
}

impl DataSourceConfigBuilder {
    fn new(bucket: impl Into<String>, prefix: impl Into<String>, export_type: ExportType) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            export_type,
            table_name: None,
            date_start: None,
            date_end: None,
            local_root: None,
            prefer_local: false,
            credentials: CredentialBundle::default(),
            region: None,
            max_rows: 1_000_000,
            max_query_len: 16_384,
            query_library_root: None,
        }
    }

    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn date_window(mut self, start: Option<PartitionValue>, end: Option<PartitionValue>) -> Self {
        self.date_start = start;
        self.date_end = end;
        self
    }

    pub fn local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_root = Some(root.into());
        self
    }

    pub fn prefer_local(mut self, prefer: bool) -> Self {
        self.prefer_local = prefer;
        self
    }

    pub fn credentials(mut self, credentials: CredentialBundle) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn max_query_len(mut self, max_query_len: usize) -> Self {
        self.max_query_len = max_query_len;
        self
    }

    pub fn query_library_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.query_library_root = Some(root.into());
        self
    }

    pub fn build(self) -> Result<DataSourceConfig> {
        if self.bucket.is_empty() {
            return Err(Error::Config("bucket must not be empty".into()));
        }
        if self.max_rows == 0 {
            return Err(Error::Config("max_rows must be at least 1".into()));
        }
        if let (Some(start), Some(end)) = (self.date_start, self.date_end) {
            if start.granularity() != self.export_type.granularity()
                || end.granularity() != self.export_type.granularity()
            {
                return Err(Error::Config(
                    "date_start/date_end granularity must match the export type".into(),
                ));
            }
        }
        let table_name = self
            .table_name
            .unwrap_or_else(|| self.export_type.default_table_name().to_string());
        Ok(DataSourceConfig {
            bucket: self.bucket,
            prefix: self.prefix,
            export_type: self.export_type,
            table_name,
            date_start: self.date_start,
            date_end: self.date_end,
            local_root: self.local_root,
            prefer_local: self.prefer_local,
            credentials: self.credentials,
            region: self.region,
            max_rows: self.max_rows,
            max_query_len: self.max_query_len,
            query_library_root: self.query_library_root,
        })
    }
}

/// Process-wide knobs that are not per-data-source (§4.13).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_max_rows: u64,
    pub default_max_query_len: usize,
    pub transfer_worker_pool_size: usize,
    pub retry_max_attempts: usize,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub query_deadline: Duration,
    pub output_root: PathBuf,
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

pub struct EngineConfigBuilder {
    default_max_rows: u64,
    default_max_query_len: usize,
    transfer_worker_pool_size: usize,
    retry_max_attempts: usize,
    retry_base_delay: Duration,
    retry_max_delay: Duration,
    query_deadline: Duration,
    output_root: PathBuf,
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self {
            default_max_rows: 1_000_000,
            default_max_query_len: 16_384,
            transfer_worker_pool_size: 8,
            retry_max_attempts: 5,
            retry_base_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_secs(10),
            query_deadline: Duration::from_secs(60),
            output_root: PathBuf::from("./views"),
        }
    }
}

impl EngineConfigBuilder {
    /// Overlays values from process environment variables, applied once at
    /// construction time (never re-read afterward, §4.13).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("CURLAKE_TRANSFER_WORKERS") {
            if let Ok(n) = v.parse() {
                self.transfer_worker_pool_size = n;
            }
        }
        if let Ok(v) = std::env::var("CURLAKE_QUERY_DEADLINE_SECS") {
            if let Ok(n) = v.parse() {
                self.query_deadline = Duration::from_secs(n);
            }
        }
        if let Ok(v) = std::env::var("CURLAKE_OUTPUT_ROOT") {
            self.output_root = PathBuf::from(v);
        }
        self
    }

    pub fn transfer_worker_pool_size(mut self, n: usize) -> Self {
        self.transfer_worker_pool_size = n;
        self
    }

    pub fn retry_policy(mut self, max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        self.retry_max_attempts = max_attempts;
        self.retry_base_delay = base_delay;
        self.retry_max_delay = max_delay;
        self
    }

    pub fn query_deadline(mut self, deadline: Duration) -> Self {
        self.query_deadline = deadline;
        self
    }

    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    pub fn build(self) -> Result<EngineConfig> {
        if self.transfer_worker_pool_size == 0 {
            return Err(Error::Config(
                "transfer_worker_pool_size must be at least 1".into(),
            ));
        }
        if self.retry_max_attempts == 0 {
            return Err(Error::Config("retry_max_attempts must be at least 1".into()));
        }
        Ok(EngineConfig {
            default_max_rows: self.default_max_rows,
            default_max_query_len: self.default_max_query_len,
            transfer_worker_pool_size: self.transfer_worker_pool_size,
            retry_max_attempts: self.retry_max_attempts,
            retry_base_delay: self.retry_base_delay,
            retry_max_delay: self.retry_max_delay,
            query_deadline: self.query_deadline,
            output_root: self.output_root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefer_local_is_ignored_without_local_root() {
        let cfg = DataSourceConfig::builder("b", "p", ExportType::CurParquet)
            .prefer_local(true)
            .build()
            .unwrap();
        assert!(!cfg.effective_prefer_local());
    }

    #[test]
    fn prefer_local_holds_with_local_root() {
        let cfg = DataSourceConfig::builder("b", "p", ExportType::CurParquet)
            .prefer_local(true)
            .local_root("/tmp/cache")
            .build()
            .unwrap();
        assert!(cfg.effective_prefer_local());
    }

    #[test]
    fn credential_resolution_order() {
        let bundle = CredentialBundle {
            static_keys: None,
            session: None,
            profile: Some("default".into()),
            role: Some(RoleAssumption {
                role_arn: "arn:aws:iam::123:role/x".into(),
                external_id: None,
                session_name: "s".into(),
            }),
        };
        assert_eq!(bundle.resolve(), CredentialMethod::Profile("default"));
    }

    #[test]
    fn empty_bucket_is_rejected() {
        assert!(DataSourceConfig::builder("", "p", ExportType::CurParquet)
            .build()
            .is_err());
    }
}
