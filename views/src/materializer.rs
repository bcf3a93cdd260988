//! View materializer (C9, §4.9): executes a manifest's views in dependency
//! order, persisting each as a columnar file and registering it for
//! dependents at higher levels.

use crate::manifest::{Manifest, ViewDefinition};
use curlake_core::{ContentFormat, DataSourceConfig, Error, FileLocation, FileReference, Partition, ResultFrame};
use curlake_query::engine::EngineAdapter;
use curlake_query::{Dispatcher, QueryRequest};
use datafusion::arrow::array::{
    BooleanArray, Float64Array, Int64Array, StringArray, TimestampNanosecondArray,
};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::parquet::arrow::AsyncArrowWriter;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// What happened to one view during a run (§4.9 step 5).
#[derive(Debug, Clone)]
pub enum ViewOutcome {
    Produced { path: PathBuf, rows: usize },
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub produced: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<String>,
}

/// Drives `manifest` to completion against `dispatcher`, writing each view's
/// output under `<output_root>/<level>/<view_name>.parquet`.
pub async fn run<A: EngineAdapter>(
    manifest: &Manifest,
    dispatcher: &Dispatcher<A>,
    adapter: &A,
    config: &DataSourceConfig,
    output_root: &Path,
) -> Result<RunReport, Error> {
    let levels = manifest.levels(&config.table_name)?;
    let mut report = RunReport::default();
    let mut aborted = false;

    for (level_idx, level) in levels.iter().enumerate().skip(1) {
        if aborted {
            for view in level {
                report.skipped.push(view.name.clone());
            }
            continue;
        }

        tracing::info!(level = level_idx, views = level.len(), "materializer: level starting");

        let outcomes = join_all(level.iter().map(|view| {
            let output_root = output_root.to_path_buf();
            async move {
                let name = view.name.clone();
                let outcome = materialize_one(dispatcher, adapter, config, view, &output_root, level_idx).await;
                (name, outcome)
            }
        }))
        .await;

        for (name, outcome) in outcomes {
            match outcome {
                Ok(ViewOutcome::Produced { rows, .. }) => {
                    tracing::info!(view = %name, rows, "materializer: view written");
                    report.produced.push(name);
                }
                Err(message) => {
                    tracing::error!(view = %name, error = %message, "materializer: view failed");
                    report.failed.push((name, message));
                    aborted = true;
                }
            }
        }
    }

    Ok(report)
}

async fn materialize_one<A: EngineAdapter>(
    dispatcher: &Dispatcher<A>,
    adapter: &A,
    config: &DataSourceConfig,
    view: &ViewDefinition,
    output_root: &Path,
    level: usize,
) -> Result<ViewOutcome, String> {
    let request = QueryRequest {
        target: view.sql.clone(),
        force_remote: false,
        row_limit: config.max_rows,
    };
    let (frame, _metadata) = dispatcher
        .query(config, request)
        .await
        .map_err(|e| e.message)?;

    let batch = frame_to_record_batch(&frame).map_err(|e| e.to_string())?;
    let dest_dir = output_root.join(level.to_string());
    let dest = dest_dir.join(format!("{}.parquet", view.name));
    write_parquet_staged(&dest, &batch).await.map_err(|e| e.to_string())?;

    let file = FileReference::new(
        FileLocation::Local(dest.clone()),
        Partition::new(config.export_type, config.date_start.unwrap_or(default_partition_value())),
        ContentFormat::Parquet,
        None,
    );
    adapter
        .register_file(&view.name, &file)
        .await
        .map_err(|e| e.to_string())?;

    Ok(ViewOutcome::Produced {
        path: dest,
        rows: frame.num_rows(),
    })
}

fn default_partition_value() -> curlake_core::PartitionValue {
    curlake_core::PartitionValue::Monthly { year: 1970, month: 1 }
}

async fn write_parquet_staged(dest: &Path, batch: &RecordBatch) -> Result<(), Error> {
    let dir = dest.parent().ok_or_else(|| Error::Internal("materializer output has no parent directory".into()))?;
    tokio::fs::create_dir_all(dir).await.map_err(|e| Error::io(dir, e))?;
    let tmp_path = dir.join(format!(".tmp-{}", Uuid::new_v4()));

    let file = tokio::fs::File::create(&tmp_path).await.map_err(|e| Error::io(&tmp_path, e))?;
    let mut writer = AsyncArrowWriter::try_new(file, batch.schema(), None)
        .map_err(|e| Error::Internal(format!("failed to open parquet writer: {e}")))?;
    writer
        .write(batch)
        .await
        .map_err(|e| Error::Internal(format!("failed to write parquet batch: {e}")))?;
    writer
        .close()
        .await
        .map_err(|e| Error::Internal(format!("failed to finalize parquet file: {e}")))?;

    tokio::fs::rename(&tmp_path, dest).await.map_err(|e| Error::io(dest, e))
}

fn frame_to_record_batch(frame: &ResultFrame) -> Result<RecordBatch, Error> {
    use curlake_core::Cell;

    let mut fields = Vec::with_capacity(frame.columns.len());
    let mut arrays: Vec<Arc<dyn datafusion::arrow::array::Array>> = Vec::with_capacity(frame.columns.len());

    for column in &frame.columns {
        let data_type = infer_type(&column.cells);
        fields.push(Field::new(&column.name, data_type.clone(), true));
        arrays.push(build_array(&column.cells, &data_type));
    }

    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, arrays).map_err(|e| Error::Internal(format!("failed to build result batch: {e}")))
}

fn infer_type(cells: &[curlake_core::Cell]) -> DataType {
    use curlake_core::Cell;
    for cell in cells {
        match cell {
            Cell::Bool(_) => return DataType::Boolean,
            Cell::Int64(_) => return DataType::Int64,
            Cell::Float64(_) => return DataType::Float64,
            Cell::Utf8(_) => return DataType::Utf8,
            Cell::TimestampNanos(_) => return DataType::Timestamp(datafusion::arrow::datatypes::TimeUnit::Nanosecond, None),
            Cell::Null => continue,
        }
    }
    DataType::Utf8
}

fn build_array(cells: &[curlake_core::Cell], data_type: &DataType) -> Arc<dyn datafusion::arrow::array::Array> {
    use curlake_core::Cell;
    match data_type {
        DataType::Boolean => Arc::new(BooleanArray::from(
            cells
                .iter()
                .map(|c| match c {
                    Cell::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Int64 => Arc::new(Int64Array::from(
            cells
                .iter()
                .map(|c| match c {
                    Cell::Int64(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Float64 => Arc::new(Float64Array::from(
            cells
                .iter()
                .map(|c| match c {
                    Cell::Float64(f) => Some(*f),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Timestamp(_, _) => Arc::new(TimestampNanosecondArray::from(
            cells
                .iter()
                .map(|c| match c {
                    Cell::TimestampNanos(ns) => Some(*ns),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        _ => Arc::new(StringArray::from(
            cells
                .iter()
                .map(|c| match c {
                    Cell::Utf8(s) => Some(s.clone()),
                    Cell::Null => None,
                    other => Some(other.to_string()),
                })
                .collect::<Vec<_>>(),
        )),
    }
}
