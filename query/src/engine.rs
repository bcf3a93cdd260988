//! Engine adapter (C7, §4.7): the only place engine-specific behavior lives.
//! `DataFusionAdapter` is the shipped implementation over `datafusion`;
//! other adapters may be added behind the same trait.

use async_trait::async_trait;
use curlake_core::{Cell, Column, Error, FileReference, ResultFrame};
use datafusion::arrow::array::Array;
use datafusion::arrow::datatypes::DataType;
use datafusion::datasource::file_format::csv::CsvFormat;
use datafusion::datasource::file_format::parquet::ParquetFormat;
use datafusion::datasource::listing::{ListingOptions, ListingTable, ListingTableConfig, ListingTableUrl};
use datafusion::execution::context::SessionContext;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Feature flags an adapter may advertise to the dispatcher (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    WindowFunctions,
    Ctes,
    ReadRemoteDirectly,
}

#[async_trait]
pub trait EngineAdapter: Send + Sync {
    async fn register_table(&self, name: &str, files: &[FileReference]) -> Result<(), Error>;
    async fn register_file(&self, name: &str, file: &FileReference) -> Result<(), Error>;
    async fn execute(&self, sql: &str, row_limit: u64) -> Result<ResultFrame, Error>;
    fn supports(&self, feature: Feature) -> bool;
    fn name(&self) -> &'static str;
}

/// Adapter over an in-process DataFusion `SessionContext`. Not assumed
/// thread-safe by callers; the dispatcher serializes access via the mutex.
pub struct DataFusionAdapter {
    ctx: Mutex<SessionContext>,
}

impl Default for DataFusionAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DataFusionAdapter {
    pub fn new() -> Self {
        Self {
            ctx: Mutex::new(SessionContext::new()),
        }
    }

    fn paths_and_format(files: &[FileReference]) -> (Vec<String>, curlake_core::ContentFormat) {
        let format = files
            .first()
            .map(|f| f.format)
            .unwrap_or(curlake_core::ContentFormat::Parquet);
        let paths = files
            .iter()
            .map(|f| match &f.location {
                curlake_core::FileLocation::Remote(key) => key.clone(),
                curlake_core::FileLocation::Local(path) => path.to_string_lossy().to_string(),
            })
            .collect();
        (paths, format)
    }
}

#[async_trait]
impl EngineAdapter for DataFusionAdapter {
    async fn register_table(&self, name: &str, files: &[FileReference]) -> Result<(), Error> {
        if files.is_empty() {
            return Err(Error::NotFound(format!("no files to register for table {name}")));
        }
        let (paths, format) = Self::paths_and_format(files);
        let ctx = self.ctx.lock().await;
        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
        register_paths(&ctx, name, &paths, format).await
    }

    async fn register_file(&self, name: &str, file: &FileReference) -> Result<(), Error> {
        let (paths, format) = Self::paths_and_format(std::slice::from_ref(file));
        let ctx = self.ctx.lock().await;
        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
        register_paths(&ctx, name, &paths, format).await
    }

    async fn execute(&self, sql: &str, row_limit: u64) -> Result<ResultFrame, Error> {
        let df = {
            let ctx = self.ctx.lock().await;
            ctx.sql(sql).await.map_err(|e| Error::Engine { raw: e.to_string() })?
        };
        let limited = df
            .limit(0, Some(row_limit as usize))
            .map_err(|e| Error::Engine { raw: e.to_string() })?;
        let batches = limited
            .collect()
            .await
            .map_err(|e| Error::Engine { raw: e.to_string() })?;
        batches_to_frame(&batches)
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(feature, Feature::WindowFunctions | Feature::Ctes)
    }

    fn name(&self) -> &'static str {
        "datafusion"
    }
}

async fn register_paths(
    ctx: &SessionContext,
    name: &str,
    paths: &[&str],
    format: curlake_core::ContentFormat,
) -> Result<(), Error> {
    if paths.is_empty() {
        return Err(Error::NotFound(format!("no files to register for table {name}")));
    }
    if ctx.table_exist(name).unwrap_or(false) {
        ctx.deregister_table(name)
            .map_err(|e| Error::Engine { raw: e.to_string() })?;
    }

    let table_urls = paths
        .iter()
        .map(|p| ListingTableUrl::parse(p).map_err(|e| Error::Engine { raw: e.to_string() }))
        .collect::<Result<Vec<_>, _>>()?;

    let listing_options = match format {
        curlake_core::ContentFormat::Parquet => ListingOptions::new(Arc::new(ParquetFormat::default())),
        curlake_core::ContentFormat::CsvGz => ListingOptions::new(Arc::new(
            CsvFormat::default().with_file_compression_type(datafusion::common::FileCompressionType::GZIP),
        ))
        .with_file_extension(".csv.gz"),
    };

    let config = ListingTableConfig::new_with_multi_paths(table_urls).with_listing_options(listing_options);
    let config = config
        .infer_schema(&ctx.state())
        .await
        .map_err(|e| Error::Engine { raw: e.to_string() })?;
    let table = ListingTable::try_new(config).map_err(|e| Error::Engine { raw: e.to_string() })?;
    ctx.register_table(name, Arc::new(table))
        .map_err(|e| Error::Engine { raw: e.to_string() })?;
    Ok(())
}

fn batches_to_frame(batches: &[datafusion::arrow::record_batch::RecordBatch]) -> Result<ResultFrame, Error> {
    let Some(first) = batches.first() else {
        return Ok(ResultFrame::empty());
    };
    let schema = first.schema();
    let mut columns: Vec<Column> = schema
        .fields()
        .iter()
        .map(|f| Column {
            name: f.name().clone(),
            cells: Vec::new(),
        })
        .collect();

    for batch in batches {
        for (idx, array) in batch.columns().iter().enumerate() {
            for row in 0..array.len() {
                columns[idx].cells.push(cell_at(array, row)?);
            }
        }
    }
    Ok(ResultFrame::new(columns))
}

fn cell_at(array: &dyn Array, row: usize) -> Result<Cell, Error> {
    use datafusion::arrow::array::{
        BooleanArray, Float64Array, Int64Array, StringArray, TimestampNanosecondArray,
    };
    if array.is_null(row) {
        return Ok(Cell::Null);
    }
    let mismatch = |expected: &str| Error::Internal(format!("expected {expected} array for column data"));
    Ok(match array.data_type() {
        DataType::Boolean => Cell::Bool(
            array
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| mismatch("boolean"))?
                .value(row),
        ),
        DataType::Int64 => Cell::Int64(
            array
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| mismatch("int64"))?
                .value(row),
        ),
        DataType::Float64 => Cell::Float64(
            array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| mismatch("float64"))?
                .value(row),
        ),
        DataType::Utf8 => Cell::Utf8(
            array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| mismatch("utf8"))?
                .value(row)
                .to_string(),
        ),
        DataType::Timestamp(_, _) => array
            .as_any()
            .downcast_ref::<TimestampNanosecondArray>()
            .map(|a| Cell::TimestampNanos(a.value(row)))
            .unwrap_or(Cell::Null),
        _ => Cell::Null,
    })
}

/// The set of features every adapter is expected to support, used by
/// the dispatcher to pick between multiple coexisting adapters (§4.7).
pub fn required_features() -> HashSet<Feature> {
    [Feature::WindowFunctions, Feature::Ctes].into_iter().collect()
}
