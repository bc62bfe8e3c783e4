//! Registers a dataset as the single table of a session

use std::sync::Arc;

use arrow::json::reader::{infer_json_schema_from_iterator, ReaderBuilder};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::{CsvReadOptions, SessionContext};

use super::errors::{ExecutorError, ExecutorResult};
use super::scrub::scrub_paths;
use crate::dataset::{read_json_records, Dataset, DatasetFormat};
use crate::planner::TABLE_NAME;

const JSON_BATCH_SIZE: usize = 1024;

/// Makes `dataset` queryable as `"dataset"` in `ctx`.
pub async fn register_dataset(
    ctx: &SessionContext,
    dataset: &Dataset,
    infer_rows: usize,
) -> ExecutorResult<()> {
    let failed = |e: String| ExecutorError::execution_failed(scrub_paths(&e, dataset));

    match dataset.format {
        DatasetFormat::Csv => {
            let path = dataset
                .path
                .to_str()
                .ok_or_else(|| failed("dataset path is not valid UTF-8".into()))?;
            let options = CsvReadOptions::new()
                .has_header(true)
                .schema_infer_max_records(infer_rows);
            ctx.register_csv(TABLE_NAME, path, options)
                .await
                .map_err(|e| failed(e.to_string()))?;
        }
        DatasetFormat::Json => {
            let bytes = tokio::fs::read(&dataset.path)
                .await
                .map_err(|e| failed(e.to_string()))?;
            let batches = decode_json(&bytes).map_err(failed)?;
            let schema = match batches.first() {
                Some(batch) => batch.schema(),
                None => Arc::new(arrow::datatypes::Schema::empty()),
            };
            let table = MemTable::try_new(schema, vec![batches]).map_err(|e| failed(e.to_string()))?;
            ctx.register_table(TABLE_NAME, Arc::new(table))
                .map_err(|e| failed(e.to_string()))?;
        }
    }

    Ok(())
}

/// Decodes a JSON dataset (array or NDJSON) into record batches.
///
/// Fields holding mixed scalar types infer as Utf8, so numbers and booleans
/// are coerced to their text form.
fn decode_json(bytes: &[u8]) -> Result<Vec<RecordBatch>, String> {
    let records = read_json_records(bytes).map_err(|e| e.to_string())?;
    let schema = infer_json_schema_from_iterator(records.iter().map(Ok))
        .map_err(|e| e.to_string())?;

    let mut decoder = ReaderBuilder::new(Arc::new(schema))
        .with_batch_size(JSON_BATCH_SIZE)
        .with_coerce_primitive(true)
        .build_decoder()
        .map_err(|e| e.to_string())?;

    let mut batches = Vec::new();
    for chunk in records.chunks(JSON_BATCH_SIZE) {
        decoder.serialize(chunk).map_err(|e| e.to_string())?;
        if let Some(batch) = decoder.flush().map_err(|e| e.to_string())? {
            batches.push(batch);
        }
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_json_lines_and_array() {
        let lines = b"{\"a\": 1, \"b\": \"x\"}\n{\"a\": 2}\n";
        let batches = decode_json(lines).unwrap();
        assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 2);
        assert_eq!(batches[0].num_columns(), 2);

        let array = br#"[{"a": 1}, {"a": 2}, {"a": 3}]"#;
        let batches = decode_json(array).unwrap();
        assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 3);
    }

    #[test]
    fn test_decode_json_many_rows() {
        let mut text = String::new();
        for i in 0..3000 {
            text.push_str(&format!("{{\"n\": {}}}\n", i));
        }
        let batches = decode_json(text.as_bytes()).unwrap();
        assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 3000);
    }

    #[test]
    fn test_decode_json_mixed_types_become_text() {
        use arrow::array::{Array, StringArray};
        use arrow::datatypes::DataType;

        let mixed = br#"[{"id": 1, "zip": 12345}, {"id": 2, "zip": "A1B 2C3"}, {"id": 3, "zip": true}]"#;
        let batches = decode_json(mixed).unwrap();
        let batch = &batches[0];

        let zip = batch.column_by_name("zip").unwrap();
        assert_eq!(zip.data_type(), &DataType::Utf8);
        let zip = zip.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(zip.value(0), "12345");
        assert_eq!(zip.value(1), "A1B 2C3");
        assert_eq!(zip.value(2), "true");
    }

    #[test]
    fn test_decode_json_rejects_scalars() {
        assert!(decode_json(b"[1, 2]").is_err());
    }
}
