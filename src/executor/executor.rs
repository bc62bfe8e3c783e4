//! Plan execution over DataFusion
//!
//! Every call builds its own `SessionContext` with exactly one registered
//! table, so no state is shared between executions. Sessions are
//! read-only: DDL, DML and statements such as `SET` are refused for every
//! plan, structured or raw.

use std::time::Duration;

use async_trait::async_trait;
use datafusion::execution::context::SQLOptions;
use datafusion::prelude::{SessionConfig, SessionContext};
use tracing::debug;

use super::errors::{ExecutorError, ExecutorResult};
use super::relation::register_dataset;
use super::result::QueryResult;
use super::scrub::scrub_paths;
use crate::dataset::{Dataset, MIN_SAMPLE_ROWS};
use crate::observability::Event;
use crate::planner::CompiledPlan;

/// Default maximum rows returned by one execution
pub const DEFAULT_ROW_CAP: usize = 1000;

/// Default per-execution timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Executes compiled plans against a dataset.
#[async_trait]
pub trait PlanExecutor: Send + Sync {
    async fn execute(&self, plan: &CompiledPlan, dataset: &Dataset) -> ExecutorResult<QueryResult>;
}

/// DataFusion-backed executor
#[derive(Debug, Clone)]
pub struct DataFusionExecutor {
    row_cap: usize,
    timeout: Duration,
    infer_rows: usize,
}

impl Default for DataFusionExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_ROW_CAP, DEFAULT_TIMEOUT)
    }
}

impl DataFusionExecutor {
    pub fn new(row_cap: usize, timeout: Duration) -> Self {
        Self {
            row_cap: row_cap.max(1),
            timeout,
            infer_rows: MIN_SAMPLE_ROWS,
        }
    }

    /// Rows sampled when the backend infers CSV column types
    pub fn with_infer_rows(mut self, rows: usize) -> Self {
        self.infer_rows = rows.max(MIN_SAMPLE_ROWS);
        self
    }

    pub fn row_cap(&self) -> usize {
        self.row_cap
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn session(&self) -> SessionContext {
        // Single partition keeps scan order stable for ungrouped plans
        let mut config = SessionConfig::new().with_target_partitions(1);
        config.options_mut().sql_parser.dialect = "PostgreSQL".to_string();
        SessionContext::new_with_config(config)
    }

    async fn run(&self, plan: &CompiledPlan, dataset: &Dataset) -> ExecutorResult<QueryResult> {
        let failed = |e: String| ExecutorError::execution_failed(scrub_paths(&e, dataset));

        let ctx = self.session();
        register_dataset(&ctx, dataset, self.infer_rows).await?;

        let options = SQLOptions::new()
            .with_allow_ddl(false)
            .with_allow_dml(false)
            .with_allow_statements(false);

        let df = ctx
            .sql_with_options(&plan.text, options)
            .await
            .map_err(|e| failed(e.to_string()))?;

        let columns: Vec<String> = df
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();

        // One extra row tells us whether the cap truncated the result
        let df = df
            .limit(0, Some(self.row_cap + 1))
            .map_err(|e| failed(e.to_string()))?;
        let batches = df.collect().await.map_err(|e| failed(e.to_string()))?;

        QueryResult::from_batches(columns, &batches, self.row_cap)
    }
}

#[async_trait]
impl PlanExecutor for DataFusionExecutor {
    async fn execute(&self, plan: &CompiledPlan, dataset: &Dataset) -> ExecutorResult<QueryResult> {
        debug!(
            event = Event::QueryExecuting.as_str(),
            dataset_id = dataset.id,
            fingerprint = %plan.fingerprint,
            mode = plan.mode.as_str(),
            "executing plan"
        );

        // Expiry drops the future; work already inside the backend may
        // still run to completion on its own threads.
        match tokio::time::timeout(self.timeout, self.run(plan, dataset)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutorError::timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DatasetFormat, DatasetStore};
    use crate::executor::ExecutorErrorCode;
    use crate::planner::{AggregateSpec, Filter, QueryCompiler, Specification};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    const SALES_CSV: &[u8] = b"region,sales\neast,10\neast,20\nwest,5\n";

    fn ingest(temp: &TempDir, format: DatasetFormat, bytes: &[u8]) -> Arc<Dataset> {
        let store = DatasetStore::open(temp.path(), 200).unwrap();
        store.ingest("t", format, bytes).unwrap().dataset
    }

    async fn run_spec(dataset: &Dataset, spec: &Specification) -> ExecutorResult<QueryResult> {
        let plan = QueryCompiler::new().compile(spec, dataset).unwrap();
        DataFusionExecutor::default().execute(&plan, dataset).await
    }

    async fn run_raw(dataset: &Dataset, text: &str) -> ExecutorResult<QueryResult> {
        let plan = QueryCompiler::new().compile_raw(text, dataset).unwrap();
        DataFusionExecutor::default().execute(&plan, dataset).await
    }

    #[tokio::test]
    async fn test_group_by_sum_csv() {
        let temp = TempDir::new().unwrap();
        let dataset = ingest(&temp, DatasetFormat::Csv, SALES_CSV);

        let spec = Specification {
            select: vec!["region".into()],
            group_by: vec!["region".into()],
            aggregates: vec![AggregateSpec::new("sum", "sales").with_alias("total")],
            ..Specification::new(dataset.id)
        };
        let result = run_spec(&dataset, &spec).await.unwrap();

        assert_eq!(result.columns, vec!["region", "total"]);
        assert_eq!(
            serde_json::to_value(&result.rows).unwrap(),
            json!([{"region": "east", "total": 30}, {"region": "west", "total": 5}])
        );
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_filters_on_json_dataset() {
        let temp = TempDir::new().unwrap();
        let json = br#"[{"name": "a", "score": 1.5}, {"name": "b", "score": 3.0}, {"name": null, "score": 9.0}]"#;
        let dataset = ingest(&temp, DatasetFormat::Json, json);

        let spec = Specification {
            filters: vec![Filter::new("score", ">", "2")],
            ..Specification::new(dataset.id)
        };
        let result = run_spec(&dataset, &spec).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.rows[0]["name"], "b");
        assert_eq!(result.rows[1]["name"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_row_cap_truncates() {
        let temp = TempDir::new().unwrap();
        let dataset = ingest(&temp, DatasetFormat::Csv, SALES_CSV);
        let plan = QueryCompiler::new().preview(&dataset, 100);

        let result = DataFusionExecutor::new(2, DEFAULT_TIMEOUT)
            .execute(&plan, &dataset)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.truncated);
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let temp = TempDir::new().unwrap();
        let dataset = ingest(&temp, DatasetFormat::Csv, SALES_CSV);
        let plan = QueryCompiler::new().preview(&dataset, 10);

        let err = DataFusionExecutor::new(DEFAULT_ROW_CAP, Duration::ZERO)
            .execute(&plan, &dataset)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::ExecutionTimeout);
    }

    #[tokio::test]
    async fn test_ddl_and_dml_refused() {
        let temp = TempDir::new().unwrap();
        let dataset = ingest(&temp, DatasetFormat::Csv, SALES_CSV);

        for text in [
            "CREATE TABLE t AS SELECT 1",
            "DROP TABLE {{table}}",
            "INSERT INTO {{table}} VALUES ('x', 1)",
            "SET datafusion.execution.batch_size = 1",
        ] {
            let err = run_raw(&dataset, text).await.unwrap_err();
            assert_eq!(err.code(), ExecutorErrorCode::ExecutionFailed, "{}", text);
        }
    }

    #[tokio::test]
    async fn test_errors_do_not_leak_paths() {
        let temp = TempDir::new().unwrap();
        let dataset = ingest(&temp, DatasetFormat::Csv, SALES_CSV);

        let err = run_raw(&dataset, "SELECT * FROM '/etc/passwd'").await.unwrap_err();
        assert!(!err.message().contains("/etc/passwd"), "{}", err.message());

        let err = run_raw(&dataset, "SELECT nope FROM {{table}}").await.unwrap_err();
        let temp_path = temp.path().to_string_lossy().to_string();
        assert!(!err.message().contains(&temp_path));
    }

    #[tokio::test]
    async fn test_empty_result_keeps_columns() {
        let temp = TempDir::new().unwrap();
        let dataset = ingest(&temp, DatasetFormat::Csv, SALES_CSV);

        let spec = Specification {
            select: vec!["region".into()],
            filters: vec![Filter::new("region", "=", "north")],
            ..Specification::new(dataset.id)
        };
        let result = run_spec(&dataset, &spec).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns, vec!["region"]);
    }
}
