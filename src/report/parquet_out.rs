// src/report/parquet_out.rs
use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{fs::File, path::Path, sync::Arc};
use tracing::info;

use crate::config::{
    COL_GDP, COL_GDP_PER_CAPITA, COL_IDENTIFIER, COL_POPULATION, COL_REGION, COL_STATE,
    COL_STATE_CODE,
};
use crate::schema::MergedRow;

/// Arrow schema of the merged per-state table, in report column order.
pub fn merged_schema() -> Schema {
    Schema::new(vec![
        Field::new(COL_STATE, DataType::Utf8, true),
        Field::new(COL_STATE_CODE, DataType::Utf8, false),
        Field::new(COL_REGION, DataType::Utf8, true),
        Field::new(COL_IDENTIFIER, DataType::Int64, true),
        Field::new(COL_POPULATION, DataType::Float64, false),
        Field::new(COL_GDP, DataType::Float64, true),
        Field::new(COL_GDP_PER_CAPITA, DataType::Float64, true),
    ])
}

/// Build one record batch holding every merged row.
pub fn merged_batch(rows: &[MergedRow]) -> Result<RecordBatch> {
    let schema = Arc::new(merged_schema());
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.state.as_deref()))),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.state_code.as_str()),
        )),
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.region.as_deref()))),
        Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.identifier))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.population))),
        Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.gdp))),
        Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.gdp_per_capita))),
    ];
    RecordBatch::try_new(schema, columns).context("building merged record batch")
}

/// Write the merged table as a single Snappy-compressed Parquet file.
pub fn write_merged_parquet<P: AsRef<Path>>(path: P, rows: &[MergedRow]) -> Result<()> {
    let path = path.as_ref();
    let batch = merged_batch(rows)?;

    let file = File::create(path).with_context(|| format!("creating parquet file {:?}", path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer for merged table")?;
    writer.write(&batch).context("writing merged batch")?;
    writer.close().context("closing merged table writer")?;

    info!(path = %path.display(), rows = rows.len(), "merged table written");
    Ok(())
}
