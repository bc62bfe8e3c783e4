//! Query Engine service
//!
//! Owns every collaborator explicitly; nothing here is global. One
//! `QueryEngine` is built at startup and shared as `Arc<QueryEngine>`.
//!
//! # Run Flow (strict order)
//!
//! 1. Resolve dataset
//! 2. Compile (structured) or gate + substitute (raw)
//! 3. Cache lookup by fingerprint; on miss, execute
//! 4. Count, log, audit

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::errors::{EngineError, EngineResult};
use super::identity::Caller;
use crate::cache::{CacheConfig, CacheStats, CacheStatus, ResultCache};
use crate::dataset::{Dataset, DatasetFormat, DatasetStore};
use crate::executor::{PlanExecutor, QueryResult};
use crate::observability::{
    self, AuditAction, AuditOutcome, AuditRecord, AuditSink, Event, MetricsRegistry,
    MetricsSnapshot,
};
use crate::planner::{
    CompiledPlan, Fingerprint, QueryCompiler, QueryRequest, QuerySource, Specification,
};

/// Default number of rows returned by a preview
pub const DEFAULT_PREVIEW_ROWS: u64 = 50;

/// Engine tunables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub preview_rows: u64,
    /// Raw query text is refused unless this is set
    pub raw_sql_enabled: bool,
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preview_rows: DEFAULT_PREVIEW_ROWS,
            raw_sql_enabled: false,
            cache: CacheConfig::default(),
        }
    }
}

/// Result of a run request
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub result: Arc<QueryResult>,
    pub fingerprint: Fingerprint,
    pub status: CacheStatus,
}

impl QueryOutcome {
    pub fn cached(&self) -> bool {
        self.status.is_cached()
    }
}

/// Result of an upload
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub dataset: Arc<Dataset>,
    /// Set when the file was stored but its schema could not be inferred
    pub warning: Option<String>,
}

/// Counters plus cache state
#[derive(Debug, Clone, Serialize)]
pub struct EngineMetrics {
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
    pub cache: CacheStats,
    pub cache_entries: usize,
}

/// The dataset query engine
pub struct QueryEngine {
    store: Arc<DatasetStore>,
    compiler: QueryCompiler,
    executor: Arc<dyn PlanExecutor>,
    cache: ResultCache<QueryResult>,
    metrics: MetricsRegistry,
    audit: Arc<dyn AuditSink>,
    config: EngineConfig,
}

impl QueryEngine {
    pub fn new(
        store: Arc<DatasetStore>,
        executor: Arc<dyn PlanExecutor>,
        audit: Arc<dyn AuditSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            compiler: QueryCompiler::new(),
            executor,
            cache: ResultCache::new(config.cache.clone()),
            metrics: MetricsRegistry::new(),
            audit,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    // ==================
    // Datasets
    // ==================

    /// Stores an uploaded file and infers its schema.
    ///
    /// `format` wins over the file name extension when both are given.
    /// A failed schema sniff is reported as a warning, not an error.
    pub async fn upload(
        &self,
        caller: &Caller,
        name: &str,
        format: Option<&str>,
        file_name: Option<&str>,
        bytes: Vec<u8>,
    ) -> EngineResult<UploadOutcome> {
        let result = self.upload_inner(caller, name, format, file_name, bytes).await;

        let record = match &result {
            Ok(outcome) => AuditRecord::new(
                AuditAction::DatasetUpload,
                AuditOutcome::Success,
                &caller.user_id,
            )
            .with_dataset(outcome.dataset.id),
            Err(err) => AuditRecord::new(
                AuditAction::DatasetUpload,
                outcome_for(err),
                &caller.user_id,
            )
            .with_error_code(err.code()),
        };
        observability::audit(self.audit.as_ref(), &record);

        result
    }

    async fn upload_inner(
        &self,
        caller: &Caller,
        name: &str,
        format: Option<&str>,
        file_name: Option<&str>,
        bytes: Vec<u8>,
    ) -> EngineResult<UploadOutcome> {
        if !caller.role.can_write() {
            return Err(EngineError::Forbidden(format!(
                "role '{}' may not upload datasets",
                caller.role
            )));
        }

        let format: DatasetFormat = match (format, file_name) {
            (Some(f), _) if !f.trim().is_empty() => f.parse()?,
            (_, Some(file)) => DatasetFormat::from_file_name(file)?,
            _ => {
                return Err(EngineError::UnsupportedFormat(
                    "format is required when the upload has no file name".into(),
                ))
            }
        };
        let name = match name.trim() {
            "" => file_name.unwrap_or("untitled").to_string(),
            n => n.to_string(),
        };

        let store = Arc::clone(&self.store);
        let ingested = tokio::task::spawn_blocking(move || store.ingest(&name, format, &bytes))
            .await
            .map_err(|e| EngineError::internal(format!("ingest task failed: {}", e)))??;

        self.metrics.increment_datasets_ingested();
        let warning = ingested.warning.map(|w| w.to_string());
        match &warning {
            Some(w) => {
                self.metrics.increment_ingest_warnings();
                warn!(
                    event = Event::DatasetIngestWarning.as_str(),
                    dataset_id = ingested.dataset.id,
                    warning = %w,
                    "dataset stored without schema"
                );
            }
            None => info!(
                event = Event::DatasetIngested.as_str(),
                dataset_id = ingested.dataset.id,
                format = ingested.dataset.format.as_str(),
                columns = ingested.dataset.schema.len(),
                size_bytes = ingested.dataset.size_bytes,
            ),
        }

        Ok(UploadOutcome {
            dataset: ingested.dataset,
            warning,
        })
    }

    pub fn get(&self, dataset_id: u64) -> EngineResult<Arc<Dataset>> {
        Ok(self.store.resolve(dataset_id)?)
    }

    pub fn list(&self) -> EngineResult<Vec<Arc<Dataset>>> {
        Ok(self.store.list()?)
    }

    /// Re-samples a stored dataset. Editors and owners only.
    pub async fn refresh_schema(
        &self,
        caller: &Caller,
        dataset_id: u64,
    ) -> EngineResult<Arc<Dataset>> {
        if !caller.role.can_write() {
            return Err(EngineError::Forbidden(format!(
                "role '{}' may not refresh schemas",
                caller.role
            )));
        }

        let store = Arc::clone(&self.store);
        let dataset = tokio::task::spawn_blocking(move || store.refresh_schema(dataset_id))
            .await
            .map_err(|e| EngineError::internal(format!("refresh task failed: {}", e)))??;

        info!(
            event = Event::DatasetSchemaRefreshed.as_str(),
            dataset_id,
            columns = dataset.schema.len(),
        );
        Ok(dataset)
    }

    /// First `preview_rows` rows in file order. Never cached.
    pub async fn preview(&self, dataset_id: u64) -> EngineResult<QueryResult> {
        let dataset = self.store.resolve(dataset_id)?;
        let plan = self.compiler.preview(&dataset, self.config.preview_rows);

        self.metrics.increment_executor_invocations();
        Ok(self.executor.execute(&plan, &dataset).await?)
    }

    // ==================
    // Queries
    // ==================

    /// Compiles a specification without executing it.
    pub fn build(&self, spec: &Specification) -> EngineResult<CompiledPlan> {
        let dataset = self.store.resolve(spec.dataset_id)?;
        Ok(self.compiler.compile(spec, &dataset)?)
    }

    /// Compiles, executes through the cache, and audits one run request.
    pub async fn run(&self, caller: &Caller, request: QueryRequest) -> EngineResult<QueryOutcome> {
        let dataset_id = request.dataset_id;
        info!(
            event = Event::QueryReceived.as_str(),
            dataset_id,
            actor = %caller.user_id,
        );

        let result = self.run_inner(caller, request).await;

        let mut record = match &result {
            Ok(outcome) => {
                self.metrics.increment_queries_executed();
                match outcome.status {
                    CacheStatus::Hit => self.metrics.increment_cache_hits(),
                    CacheStatus::Miss => self.metrics.increment_cache_misses(),
                    CacheStatus::Coalesced => self.metrics.increment_cache_coalesced(),
                }
                info!(
                    event = Event::QueryExecuted.as_str(),
                    dataset_id,
                    fingerprint = %outcome.fingerprint,
                    cache = outcome.status.as_str(),
                    rows = outcome.result.len(),
                    truncated = outcome.result.truncated,
                );

                AuditRecord::new(AuditAction::QueryRun, AuditOutcome::Success, &caller.user_id)
                    .with_cache(outcome.status.as_str())
                    .with_fingerprint(outcome.fingerprint.as_str())
            }
            Err(err) => {
                self.record_failure(dataset_id, err);
                AuditRecord::new(AuditAction::QueryRun, outcome_for(err), &caller.user_id)
                    .with_error_code(err.code())
            }
        };
        record = record.with_dataset(dataset_id);
        observability::audit(self.audit.as_ref(), &record);

        result
    }

    async fn run_inner(&self, caller: &Caller, request: QueryRequest) -> EngineResult<QueryOutcome> {
        let dataset = self.store.resolve(request.dataset_id)?;

        let plan = match &request.source {
            QuerySource::Spec(spec) => self.compiler.compile(spec, &dataset)?,
            QuerySource::RawSql(text) => {
                if !self.config.raw_sql_enabled {
                    return Err(EngineError::Forbidden("raw_sql is disabled".into()));
                }
                if !caller.role.can_write() {
                    return Err(EngineError::Forbidden(format!(
                        "role '{}' may not run raw_sql",
                        caller.role
                    )));
                }
                self.compiler.compile_raw(text, &dataset)?
            }
        };

        info!(
            event = Event::QueryPlanned.as_str(),
            dataset_id = dataset.id,
            fingerprint = %plan.fingerprint,
            mode = plan.mode.as_str(),
        );

        let (result, status) = self
            .cache
            .get_or_compute(&plan.fingerprint, || async {
                self.metrics.increment_executor_invocations();
                self.executor.execute(&plan, &dataset).await
            })
            .await?;

        Ok(QueryOutcome {
            result,
            fingerprint: plan.fingerprint,
            status,
        })
    }

    fn record_failure(&self, dataset_id: u64, err: &EngineError) {
        let event = match err {
            EngineError::Timeout(_) => {
                self.metrics.increment_queries_timed_out();
                Event::QueryTimedOut
            }
            e if e.is_rejection() => {
                self.metrics.increment_queries_rejected();
                Event::QueryRejected
            }
            _ => {
                self.metrics.increment_queries_failed();
                Event::QueryFailed
            }
        };
        warn!(
            event = event.as_str(),
            dataset_id,
            code = err.code(),
            error = %err.public_message(),
        );
    }

    // ==================
    // Observability
    // ==================

    pub fn metrics(&self) -> EngineMetrics {
        EngineMetrics {
            counters: self.metrics.snapshot(),
            cache: self.cache.stats(),
            cache_entries: self.cache.len(),
        }
    }

    /// Backend calls so far, previews included
    pub fn executor_invocations(&self) -> u64 {
        self.metrics.executor_invocations()
    }

    /// Drops expired cache entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }
}

fn outcome_for(err: &EngineError) -> AuditOutcome {
    if err.is_rejection() {
        AuditOutcome::Rejected
    } else {
        AuditOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Role;
    use crate::executor::DataFusionExecutor;
    use crate::observability::MemoryAuditLog;
    use crate::planner::{AggregateSpec, Filter};
    use tempfile::TempDir;

    const SALES_CSV: &[u8] = b"region,sales\neast,10\neast,20\nwest,5\n";

    fn engine(temp: &TempDir, config: EngineConfig) -> (QueryEngine, Arc<MemoryAuditLog>) {
        let store = Arc::new(DatasetStore::open(temp.path(), 200).unwrap());
        let audit = Arc::new(MemoryAuditLog::new());
        let engine = QueryEngine::new(
            store,
            Arc::new(DataFusionExecutor::default()),
            audit.clone(),
            config,
        );
        (engine, audit)
    }

    fn editor() -> Caller {
        Caller::new("alice", Role::Editor)
    }

    fn sales_spec(id: u64) -> Specification {
        let mut spec = Specification::new(id);
        spec.group_by = vec!["region".into()];
        spec.aggregates = vec![AggregateSpec::new("sum", "sales").with_alias("total")];
        spec
    }

    // =========================================================================
    // Upload
    // =========================================================================

    #[tokio::test]
    async fn test_upload_detects_format_from_file_name() {
        let temp = TempDir::new().unwrap();
        let (engine, audit) = engine(&temp, EngineConfig::default());

        let outcome = engine
            .upload(&editor(), "sales", None, Some("sales.csv"), SALES_CSV.to_vec())
            .await
            .unwrap();

        assert_eq!(outcome.dataset.id, 1);
        assert_eq!(outcome.dataset.format, DatasetFormat::Csv);
        assert!(outcome.warning.is_none());

        let records = audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, AuditAction::DatasetUpload);
        assert_eq!(records[0].dataset_id, Some(1));
    }

    #[tokio::test]
    async fn test_viewer_cannot_upload() {
        let temp = TempDir::new().unwrap();
        let (engine, audit) = engine(&temp, EngineConfig::default());

        let err = engine
            .upload(
                &Caller::new("v", Role::Viewer),
                "x",
                Some("csv"),
                None,
                SALES_CSV.to_vec(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 403);
        assert_eq!(audit.records()[0].outcome, AuditOutcome::Rejected);
        assert!(engine.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = engine(&temp, EngineConfig::default());

        let err = engine
            .upload(&editor(), "x", None, Some("book.xlsx"), vec![1, 2, 3])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FORMAT");
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_failed_sniff_is_warning() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = engine(&temp, EngineConfig::default());

        let outcome = engine
            .upload(&editor(), "broken", Some("json"), None, b"{oops".to_vec())
            .await
            .unwrap();

        assert!(outcome.warning.is_some());
        assert_eq!(engine.metrics().counters.ingest_warnings, 1);

        let err = engine.build(&Specification::new(outcome.dataset.id)).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    // =========================================================================
    // Run
    // =========================================================================

    #[tokio::test]
    async fn test_run_then_cached() {
        let temp = TempDir::new().unwrap();
        let (engine, audit) = engine(&temp, EngineConfig::default());
        let id = engine
            .upload(&editor(), "s", Some("csv"), None, SALES_CSV.to_vec())
            .await
            .unwrap()
            .dataset
            .id;

        let first = engine
            .run(&editor(), QueryRequest::spec(sales_spec(id)))
            .await
            .unwrap();
        let second = engine
            .run(&editor(), QueryRequest::spec(sales_spec(id)))
            .await
            .unwrap();

        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(second.status, CacheStatus::Hit);
        assert!(second.cached());
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(engine.executor_invocations(), 1);

        let runs: Vec<_> = audit
            .records()
            .into_iter()
            .filter(|r| r.action == AuditAction::QueryRun)
            .collect();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].cache.as_deref(), Some("hit"));
        assert_eq!(runs[1].dataset_id, Some(id));
    }

    #[tokio::test]
    async fn test_unknown_column_rejected_and_audited() {
        let temp = TempDir::new().unwrap();
        let (engine, audit) = engine(&temp, EngineConfig::default());
        let id = engine
            .upload(&editor(), "s", Some("csv"), None, SALES_CSV.to_vec())
            .await
            .unwrap()
            .dataset
            .id;

        let mut spec = Specification::new(id);
        spec.filters = vec![Filter::new("ghost", "=", "1")];
        let err = engine.run(&editor(), QueryRequest::spec(spec)).await.unwrap_err();

        assert_eq!(err.code(), "QUERY_UNKNOWN_COLUMN");
        assert_eq!(engine.executor_invocations(), 0);
        assert_eq!(engine.metrics().counters.queries_rejected, 1);

        let last = audit.records().pop().unwrap();
        assert_eq!(last.outcome, AuditOutcome::Rejected);
        assert_eq!(last.error_code.as_deref(), Some("QUERY_UNKNOWN_COLUMN"));
    }

    #[tokio::test]
    async fn test_missing_dataset_is_404() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = engine(&temp, EngineConfig::default());

        let err = engine
            .run(&editor(), QueryRequest::spec(Specification::new(99)))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    // =========================================================================
    // Raw SQL gate
    // =========================================================================

    #[tokio::test]
    async fn test_raw_sql_disabled_by_default() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = engine(&temp, EngineConfig::default());
        engine
            .upload(&editor(), "s", Some("csv"), None, SALES_CSV.to_vec())
            .await
            .unwrap();

        let err = engine
            .run(&editor(), QueryRequest::raw_sql(1, "SELECT * FROM {{table}}"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_raw_sql_requires_writer_role() {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig {
            raw_sql_enabled: true,
            ..EngineConfig::default()
        };
        let (engine, _) = engine(&temp, config);
        engine
            .upload(&editor(), "s", Some("csv"), None, SALES_CSV.to_vec())
            .await
            .unwrap();

        let viewer = Caller::new("v", Role::Viewer);
        let err = engine
            .run(&viewer, QueryRequest::raw_sql(1, "SELECT * FROM {{table}}"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        let ok = engine
            .run(
                &editor(),
                QueryRequest::raw_sql(1, "SELECT region FROM {{table}} ORDER BY region"),
            )
            .await
            .unwrap();
        assert_eq!(ok.result.len(), 3);
    }

    #[tokio::test]
    async fn test_preview_not_cached() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = engine(&temp, EngineConfig::default());
        engine
            .upload(&editor(), "s", Some("csv"), None, SALES_CSV.to_vec())
            .await
            .unwrap();

        engine.preview(1).await.unwrap();
        let preview = engine.preview(1).await.unwrap();

        assert_eq!(preview.columns, vec!["region", "sales"]);
        assert_eq!(preview.len(), 3);
        assert_eq!(engine.executor_invocations(), 2);
        assert!(engine.metrics().cache_entries == 0);
    }
}
