//! Query dispatcher (C8, §4.8): resolve → prepare → execute → classify.

use crate::classifier::{self, QueryError};
use crate::engine::EngineAdapter;
use crate::resolver::{self, Backing, Source};
use crate::safety;
use curlake_core::{ContentFormat, DataSourceConfig, Error, FileReference, ResultFrame};
use curlake_storage::{discovery, ClientProvider, LocalCache};
use object_store::ObjectStore;
use std::sync::Arc;
use std::time::Instant;

/// Request handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub target: String,
    pub force_remote: bool,
    pub row_limit: u64,
}

/// Metadata attached to a successful execution (§4.8 step 6).
#[derive(Debug, Clone)]
pub struct QueryMetadata {
    pub data_source: DataSource,
    pub rows: usize,
    pub execution_time_ms: u64,
    pub engine: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Local,
    Remote,
    DirectFile,
}

pub struct Dispatcher<A: EngineAdapter> {
    adapter: Arc<A>,
    clients: ClientProvider,
}

impl<A: EngineAdapter> Dispatcher<A> {
    pub fn new(adapter: Arc<A>, clients: ClientProvider) -> Self {
        Self { adapter, clients }
    }

    /// `query(target, options) → (frame, metadata) | ErrorKind` (§4.8).
    pub async fn query(
        &self,
        config: &DataSourceConfig,
        request: QueryRequest,
    ) -> Result<(ResultFrame, QueryMetadata), QueryError> {
        let target = request.target.clone();
        let result = self.query_inner(config, request).await;
        if let Err(err) = &result {
            tracing::warn!(
                table = %config.table_name,
                target = %target,
                kind = ?err.kind,
                message = %err.message,
                "dispatcher: query failed"
            );
        }
        result
    }

    async fn query_inner(
        &self,
        config: &DataSourceConfig,
        request: QueryRequest,
    ) -> Result<(ResultFrame, QueryMetadata), QueryError> {
        let started = Instant::now();

        let accepted_extensions: Vec<&str> = config
            .export_type
            .accepted_formats()
            .iter()
            .map(|f| f.extension())
            .collect();
        let cache_usable = LocalCache::is_usable(config);

        let source = resolver::resolve(
            &request.target,
            &accepted_extensions,
            config.query_library_root.as_deref(),
            request.force_remote,
            config.effective_prefer_local(),
            cache_usable,
        )
        .map_err(|e| classifier::invalid_query(rule_of(&e), &e.to_string()))?;

        match source {
            Source::DirectFile { path } => {
                let preview = format!("SELECT * FROM {}", config.table_name);
                safety::validate(&preview, config.max_query_len, request.row_limit, config.max_rows)
                    .map_err(|e| classifier::invalid_query(rule_of(&e), &e.to_string()))?;
                self.run_direct_file(config, &path, request.row_limit, started).await
            }
            Source::Sql { text, backing } => {
                safety::validate(&text, config.max_query_len, request.row_limit, config.max_rows)
                    .map_err(|e| classifier::invalid_query(rule_of(&e), &e.to_string()))?;
                self.run_sql(config, &text, backing, request.row_limit, started).await
            }
        }
    }

    async fn run_direct_file(
        &self,
        config: &DataSourceConfig,
        path: &std::path::Path,
        row_limit: u64,
        started: Instant,
    ) -> Result<(ResultFrame, QueryMetadata), QueryError> {
        let format = config
            .export_type
            .classify_file(&path.file_name().unwrap_or_default().to_string_lossy())
            .unwrap_or(ContentFormat::Parquet);
        let file = FileReference::new(
            curlake_core::FileLocation::Local(path.to_path_buf()),
            curlake_core::Partition::new(config.export_type, config.date_start.unwrap_or_else(default_partition_value)),
            format,
            None,
        );
        self.adapter
            .register_file(&config.table_name, &file)
            .await
            .map_err(engine_error_to_query_error)?;
        let sql = format!("SELECT * FROM {}", config.table_name);
        let frame = self
            .adapter
            .execute(&sql, row_limit)
            .await
            .map_err(engine_error_to_query_error)?;
        let rows = frame.num_rows();
        tracing::info!(
            table = %config.table_name,
            data_source = "direct-file",
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dispatcher: query complete"
        );
        Ok((
            frame,
            QueryMetadata {
                data_source: DataSource::DirectFile,
                rows,
                execution_time_ms: started.elapsed().as_millis() as u64,
                engine: self.adapter.name(),
            },
        ))
    }

    async fn run_sql(
        &self,
        config: &DataSourceConfig,
        sql: &str,
        backing: Backing,
        row_limit: u64,
        started: Instant,
    ) -> Result<(ResultFrame, QueryMetadata), QueryError> {
        let files = match backing {
            Backing::Local => LocalCache::list_files(config).map_err(engine_error_to_query_error)?,
            Backing::Remote => {
                let client = self.clients.get_client(config).await.map_err(engine_error_to_query_error)?;
                self.discover_remote(config, &client).await?
            }
        };

        self.adapter
            .register_table(&config.table_name, &files)
            .await
            .map_err(engine_error_to_query_error)?;

        let frame = self
            .adapter
            .execute(sql, row_limit)
            .await
            .map_err(engine_error_to_query_error)?;

        let data_source = match backing {
            Backing::Local => DataSource::Local,
            Backing::Remote => DataSource::Remote,
        };
        let rows = frame.num_rows();
        tracing::info!(
            table = %config.table_name,
            data_source = ?data_source,
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dispatcher: query complete"
        );
        Ok((
            frame,
            QueryMetadata {
                data_source,
                rows,
                execution_time_ms: started.elapsed().as_millis() as u64,
                engine: self.adapter.name(),
            },
        ))
    }

    async fn discover_remote(
        &self,
        config: &DataSourceConfig,
        client: &Arc<dyn ObjectStore>,
    ) -> Result<Vec<FileReference>, QueryError> {
        let result = discovery::list(config, client).await.map_err(engine_error_to_query_error)?;
        Ok(result.files)
    }
}

fn default_partition_value() -> curlake_core::PartitionValue {
    curlake_core::PartitionValue::Monthly { year: 1970, month: 1 }
}

fn rule_of(e: &Error) -> &str {
    match e {
        Error::Validation { rule, .. } => rule,
        _ => "invalid_query",
    }
}

fn engine_error_to_query_error(e: Error) -> QueryError {
    match e {
        Error::Engine { raw } => classifier::classify(&raw),
        Error::AccessDenied(msg) => classifier::classify(&format!("access denied: {msg}")),
        Error::NotFound(msg) => classifier::classify(&format!("not found: {msg}")),
        other => classifier::classify(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Feature;
    use curlake_core::ExportType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAdapter {
        register_calls: AtomicUsize,
    }

    impl CountingAdapter {
        fn new() -> Self {
            Self {
                register_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl EngineAdapter for CountingAdapter {
        async fn register_table(&self, _name: &str, _files: &[FileReference]) -> Result<(), Error> {
            self.register_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn register_file(&self, _name: &str, _file: &FileReference) -> Result<(), Error> {
            self.register_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn execute(&self, _sql: &str, _row_limit: u64) -> Result<ResultFrame, Error> {
            Ok(ResultFrame::empty())
        }

        fn supports(&self, _feature: Feature) -> bool {
            true
        }

        fn name(&self) -> &'static str {
            "counting-test-adapter"
        }
    }

    #[tokio::test]
    async fn rejected_write_never_reaches_adapter() {
        let adapter = Arc::new(CountingAdapter::new());
        let dispatcher = Dispatcher::new(adapter.clone(), ClientProvider::new());
        let config = DataSourceConfig::builder("bucket", "exports", ExportType::CurParquet)
            .build()
            .unwrap();
        let request = QueryRequest {
            target: "DELETE FROM base".to_string(),
            force_remote: true,
            row_limit: 10,
        };
        let err = dispatcher.query(&config, request).await.unwrap_err();
        assert_eq!(err.kind, classifier::ErrorKind::InvalidQuery);
        assert_eq!(adapter.register_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn direct_file_over_row_limit_never_reaches_adapter() {
        let adapter = Arc::new(CountingAdapter::new());
        let dispatcher = Dispatcher::new(adapter.clone(), ClientProvider::new());
        let file = tempfile::NamedTempFile::with_suffix(".parquet").unwrap();
        let config = DataSourceConfig::builder("bucket", "exports", ExportType::CurParquet)
            .max_rows(100)
            .build()
            .unwrap();
        let request = QueryRequest {
            target: file.path().to_str().unwrap().to_string(),
            force_remote: true,
            row_limit: 1_000,
        };
        let err = dispatcher.query(&config, request).await.unwrap_err();
        assert_eq!(err.kind, classifier::ErrorKind::InvalidQuery);
        assert_eq!(adapter.register_calls.load(Ordering::SeqCst), 0);
    }
}
