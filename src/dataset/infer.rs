//! Schema inference over a bounded sample of rows
//!
//! CSV files are sniffed with Arrow's CSV inference (header row required).
//! JSON files may be a top-level array of objects or newline-delimited
//! objects; both are normalized to a list of objects first.

use std::io::Cursor;

use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Schema as ArrowSchema};
use arrow::json::reader::infer_json_schema_from_iterator;
use serde_json::Value;

use super::errors::{DatasetError, DatasetResult};
use super::types::{Column, ColumnType, DatasetFormat, Schema};

/// Minimum number of rows sampled for inference
pub const MIN_SAMPLE_ROWS: usize = 200;

/// Infers a schema from raw dataset bytes.
pub fn infer_schema(
    format: DatasetFormat,
    bytes: &[u8],
    sample_rows: usize,
) -> DatasetResult<Schema> {
    let sample_rows = sample_rows.max(MIN_SAMPLE_ROWS);
    let arrow_schema = match format {
        DatasetFormat::Csv => infer_csv(bytes, sample_rows)?,
        DatasetFormat::Json => infer_json(bytes, sample_rows)?,
    };

    if arrow_schema.fields().is_empty() {
        return Err(DatasetError::Ingest("no columns found in sample".into()));
    }

    Ok(from_arrow(&arrow_schema))
}

/// Converts an Arrow schema to the coarse logical schema.
pub fn from_arrow(schema: &ArrowSchema) -> Schema {
    Schema::new(
        schema
            .fields()
            .iter()
            .map(|f| Column {
                name: f.name().clone(),
                column_type: column_type(f.data_type()),
            })
            .collect(),
    )
}

fn column_type(data_type: &DataType) -> ColumnType {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => ColumnType::Integer,
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => ColumnType::Float,
        DataType::Boolean => ColumnType::Boolean,
        DataType::Date32 | DataType::Date64 => ColumnType::Date,
        DataType::Timestamp(_, _) => ColumnType::Timestamp,
        _ => ColumnType::String,
    }
}

fn infer_csv(bytes: &[u8], sample_rows: usize) -> DatasetResult<ArrowSchema> {
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(Cursor::new(bytes), Some(sample_rows))
        .map_err(|e| DatasetError::Ingest(e.to_string()))?;
    Ok(schema)
}

fn infer_json(bytes: &[u8], sample_rows: usize) -> DatasetResult<ArrowSchema> {
    let records = read_json_records(bytes)?;
    infer_json_schema_from_iterator(records.iter().take(sample_rows).map(Ok))
        .map_err(|e| DatasetError::Ingest(e.to_string()))
}

/// Parses a JSON dataset into its row objects.
///
/// Accepts `[{...}, {...}]` or one object per line. Any element that is
/// not an object is rejected.
pub fn read_json_records(bytes: &[u8]) -> DatasetResult<Vec<Value>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| DatasetError::Ingest(format!("invalid UTF-8: {}", e)))?;
    let trimmed = text.trim_start();

    let records: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|e| DatasetError::Ingest(e.to_string()))?
    } else {
        trimmed
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .map_err(|e| DatasetError::Ingest(format!("line {}: {}", n + 1, e)))
            })
            .collect::<DatasetResult<_>>()?
    };

    if let Some(pos) = records.iter().position(|r| !r.is_object()) {
        return Err(DatasetError::Ingest(format!(
            "record {} is not a JSON object",
            pos
        )));
    }

    Ok(records)
}
