//! Result types for query execution

use arrow::json::writer::JsonArray;
use arrow::json::WriterBuilder;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{ExecutorError, ExecutorResult};

/// Tabular query result with rows as ordered JSON objects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Output column names, in projection order
    pub columns: Vec<String>,
    /// One object per row; absent values are explicit `null`s
    pub rows: Vec<Map<String, Value>>,
    /// True when the row cap cut the result
    pub truncated: bool,
}

impl QueryResult {
    /// Converts collected batches, keeping at most `row_cap` rows.
    pub fn from_batches(
        columns: Vec<String>,
        batches: &[RecordBatch],
        row_cap: usize,
    ) -> ExecutorResult<Self> {
        let total: usize = batches.iter().map(RecordBatch::num_rows).sum();

        let mut kept = Vec::with_capacity(batches.len());
        let mut remaining = row_cap;
        for batch in batches {
            if remaining == 0 {
                break;
            }
            let take = batch.num_rows().min(remaining);
            kept.push(batch.slice(0, take));
            remaining -= take;
        }

        Ok(Self {
            columns,
            rows: batches_to_rows(&kept)?,
            truncated: total > row_cap,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn batches_to_rows(batches: &[RecordBatch]) -> ExecutorResult<Vec<Map<String, Value>>> {
    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());

    let refs: Vec<&RecordBatch> = batches.iter().collect();
    writer
        .write_batches(&refs)
        .map_err(|e| ExecutorError::execution_failed(format!("result encoding failed: {}", e)))?;
    writer
        .finish()
        .map_err(|e| ExecutorError::execution_failed(format!("result encoding failed: {}", e)))?;

    let buf = writer.into_inner();
    if buf.is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_slice(&buf)
        .map_err(|e| ExecutorError::execution_failed(format!("result encoding failed: {}", e)))
}
