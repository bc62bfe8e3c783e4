//! CLI command implementations
//!
//! Every command loads and validates the config first. `serve`, `ingest`
//! and `query` refuse to run against an uninitialized data directory.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::cache::{CacheConfig, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
use crate::dataset::{DatasetStore, MIN_SAMPLE_ROWS};
use crate::engine::{Caller, EngineConfig, EngineError, QueryEngine, DEFAULT_PREVIEW_ROWS};
use crate::executor::{DataFusionExecutor, DEFAULT_ROW_CAP, DEFAULT_TIMEOUT};
use crate::http_server::{HttpServer, HttpServerConfig};
use crate::observability::{log_event, Event, FileAuditLog};
use crate::planner::{QueryRequest, RunQueryBody};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error_to, write_response, write_response_to};

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Data directory; datasets live under `<data_dir>/datasets`
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default)]
    pub http: HttpServerConfig,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub ingest: IngestSection,

    /// Allow raw query text from editors and owners (default: false)
    #[serde(default)]
    pub raw_sql_enabled: bool,

    /// JSON-lines audit file (default: `<data_dir>/audit.jsonl`)
    #[serde(default)]
    pub audit_log_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    pub row_cap: usize,
    pub preview_rows: u64,
    pub timeout_ms: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            row_cap: DEFAULT_ROW_CAP,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    pub sample_rows: usize,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            sample_rows: MIN_SAMPLE_ROWS,
        }
    }
}

fn default_data_dir() -> String {
    "./aeroquery_data".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            http: HttpServerConfig::default(),
            cache: CacheSection::default(),
            executor: ExecutorSection::default(),
            ingest: IngestSection::default(),
            raw_sql_enabled: false,
            audit_log_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> CliResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(CliError::Config("data_dir must not be empty".into()));
        }
        if self.http.max_upload_bytes == 0 {
            return Err(CliError::Config("http.max_upload_bytes must be > 0".into()));
        }
        if self.cache.ttl_secs == 0 {
            return Err(CliError::Config("cache.ttl_secs must be > 0".into()));
        }
        if self.cache.max_entries == 0 {
            return Err(CliError::Config("cache.max_entries must be > 0".into()));
        }
        if self.executor.row_cap == 0 {
            return Err(CliError::Config("executor.row_cap must be > 0".into()));
        }
        if self.executor.preview_rows == 0 {
            return Err(CliError::Config("executor.preview_rows must be > 0".into()));
        }
        if self.executor.timeout_ms == 0 {
            return Err(CliError::Config("executor.timeout_ms must be > 0".into()));
        }
        if self.ingest.sample_rows < MIN_SAMPLE_ROWS {
            return Err(CliError::Config(format!(
                "ingest.sample_rows must be at least {}",
                MIN_SAMPLE_ROWS
            )));
        }
        Ok(())
    }

    /// Get data directory as Path
    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    pub fn audit_path(&self) -> PathBuf {
        match &self.audit_log_path {
            Some(path) => PathBuf::from(path),
            None => self.data_path().join("audit.jsonl"),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            preview_rows: self.executor.preview_rows,
            raw_sql_enabled: self.raw_sql_enabled,
            cache: CacheConfig::new(
                Duration::from_secs(self.cache.ttl_secs),
                self.cache.max_entries,
            ),
        }
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Serve { config } => serve(&config),
        Command::Ingest {
            config,
            name,
            file,
            format,
        } => ingest(&config, &name, &file, format.as_deref()),
        Command::Query { config } => query(&config),
    }
}

/// Writes a default config if none exists, then creates the data directory.
pub fn init(config_path: &Path) -> CliResult<()> {
    ensure_config(config_path)?;

    let config = Config::load(config_path)?;
    let data_dir = config.data_path();

    if is_initialized(data_dir) {
        return Err(CliError::AlreadyInitialized(data_dir.to_path_buf()));
    }

    let datasets = data_dir.join("datasets");
    fs::create_dir_all(&datasets).map_err(|e| {
        CliError::Config(format!("Failed to create directory {:?}: {}", datasets, e))
    })?;

    write_response(&json!({
        "initialized": true,
        "data_dir": config.data_dir,
    }))
}

/// Writes the default config to `path` unless a file is already there.
fn ensure_config(path: &Path) -> CliResult<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let default = serde_json::to_string_pretty(&Config::default())?;
    fs::write(path, default)
        .map_err(|e| CliError::Config(format!("Failed to write config {:?}: {}", path, e)))
}

/// Boots the engine and serves HTTP until Ctrl-C.
pub fn serve(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let runtime = runtime()?;

    runtime.block_on(async {
        let engine = boot(&config)?;
        let server = HttpServer::new(config.http.clone(), engine);
        server
            .start()
            .await
            .map_err(|e| CliError::Boot(format!("HTTP server failed: {}", e)))
    })
}

/// Ingests a local file as the system caller.
pub fn ingest(config_path: &Path, name: &str, file: &Path, format: Option<&str>) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let bytes = fs::read(file)
        .map_err(|e| CliError::Io(format!("Failed to read {:?}: {}", file, e)))?;
    let file_name = file.file_name().and_then(|n| n.to_str());

    let runtime = runtime()?;
    runtime.block_on(async {
        let engine = boot(&config)?;
        match engine
            .upload(&Caller::system(), name, format, file_name, bytes)
            .await
        {
            Ok(outcome) => {
                let ds = &outcome.dataset;
                write_response(&json!({
                    "dataset_id": ds.id,
                    "name": ds.name,
                    "format": ds.format,
                    "schema": ds.schema.to_json_map(),
                    "warning": outcome.warning,
                }))
            }
            Err(e) => report(&mut io::stdout().lock(), &e),
        }
    })
}

/// Reads one run request from stdin, executes it and writes the result.
pub fn query(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let body: RunQueryBody = read_request()?;

    let runtime = runtime()?;
    runtime.block_on(async {
        let engine = boot(&config)?;
        execute_query(&engine, body, &mut io::stdout().lock()).await
    })
}

/// Runs `body` as the system caller and writes the JSON line to `out`.
async fn execute_query<W: Write>(
    engine: &QueryEngine,
    body: RunQueryBody,
    out: &mut W,
) -> CliResult<()> {
    let result = match QueryRequest::try_from(body) {
        Ok(request) => engine.run(&Caller::system(), request).await,
        Err(e) => Err(EngineError::from(e)),
    };

    match result {
        Ok(outcome) => {
            let mut data = Map::new();
            data.insert("columns".into(), json!(outcome.result.columns));
            data.insert("rows".into(), json!(outcome.result.rows));
            data.insert("truncated".into(), json!(outcome.result.truncated));
            data.insert("fingerprint".into(), json!(outcome.fingerprint.as_str()));
            data.insert("cached".into(), json!(outcome.cached()));
            write_response_to(out, &Value::Object(data))
        }
        Err(e) => report(out, &e),
    }
}

/// Writes the engine error as the response line, then fails the command.
fn report<W: Write>(out: &mut W, err: &EngineError) -> CliResult<()> {
    write_error_to(out, err.code(), &err.public_message())?;
    Err(CliError::from(err))
}

/// Opens the store, audit log and executor and assembles the engine.
fn boot(config: &Config) -> CliResult<Arc<QueryEngine>> {
    log_event(Event::BootStart);

    let data_dir = config.data_path();
    if !is_initialized(data_dir) {
        return Err(CliError::NotInitialized(data_dir.to_path_buf()));
    }
    log_event(Event::ConfigLoaded);

    let store = DatasetStore::open(data_dir, config.ingest.sample_rows)
        .map_err(|e| CliError::Boot(format!("Failed to open dataset store: {}", e)))?;

    let audit = FileAuditLog::open(config.audit_path())
        .map_err(|e| CliError::Boot(format!("Failed to open audit log: {}", e)))?;

    let executor = DataFusionExecutor::new(
        config.executor.row_cap,
        Duration::from_millis(config.executor.timeout_ms),
    )
    .with_infer_rows(config.ingest.sample_rows);

    let engine = QueryEngine::new(
        Arc::new(store),
        Arc::new(executor),
        Arc::new(audit),
        config.engine_config(),
    );

    log_event(Event::BootComplete);
    Ok(Arc::new(engine))
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Boot(format!("Failed to create tokio runtime: {}", e)))
}

/// Check if data directory is initialized
fn is_initialized(data_dir: &Path) -> bool {
    data_dir.join("datasets").is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("config.json");
        fs::write(&path, json).unwrap();
        path
    }

    // =========================================================================
    // Config
    // =========================================================================

    #[test]
    fn test_minimal_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), r#"{"data_dir": "/tmp/aq"}"#);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.max_entries, 256);
        assert_eq!(config.executor.row_cap, 1000);
        assert_eq!(config.executor.preview_rows, 50);
        assert_eq!(config.executor.timeout_ms, 5000);
        assert_eq!(config.ingest.sample_rows, 200);
        assert!(!config.raw_sql_enabled);
        assert_eq!(config.audit_path(), PathBuf::from("/tmp/aq/audit.jsonl"));
    }

    #[test]
    fn test_partial_section() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"{"data_dir": "d", "cache": {"ttl_secs": 5}, "raw_sql_enabled": true}"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.cache.ttl_secs, 5);
        assert_eq!(config.cache.max_entries, 256);

        let engine = config.engine_config();
        assert!(engine.raw_sql_enabled);
        assert_eq!(engine.cache.ttl, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let temp = TempDir::new().unwrap();
        for bad in [
            r#"{"data_dir": ""}"#,
            r#"{"cache": {"ttl_secs": 0}}"#,
            r#"{"executor": {"row_cap": 0}}"#,
            r#"{"executor": {"timeout_ms": 0}}"#,
            r#"{"ingest": {"sample_rows": 10}}"#,
        ] {
            let path = write_config(temp.path(), bad);
            let err = Config::load(&path).unwrap_err();
            assert_eq!(err.code(), "AEROQUERY_CLI_CONFIG_ERROR", "{}", bad);
        }
    }

    #[test]
    fn test_malformed_config() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "{ nope");
        assert!(Config::load(&path).is_err());
    }

    // =========================================================================
    // Init / boot
    // =========================================================================

    #[test]
    fn test_init_creates_layout_once() {
        let temp = TempDir::new().unwrap();
        let data_dir = temp.path().join("data");
        let path = write_config(
            temp.path(),
            &json!({ "data_dir": data_dir.to_str().unwrap() }).to_string(),
        );

        init(&path).unwrap();
        assert!(data_dir.join("datasets").is_dir());

        let err = init(&path).unwrap_err();
        assert_eq!(err.code(), "AEROQUERY_CLI_ALREADY_INITIALIZED");
    }

    #[test]
    fn test_init_writes_default_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("aeroquery.json");

        ensure_config(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());

        // An existing file is left alone
        fs::write(&path, r#"{"data_dir": "elsewhere"}"#).unwrap();
        ensure_config(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap().data_dir, "elsewhere");
    }

    #[tokio::test]
    async fn test_refused_query_reports_and_fails() {
        use crate::executor::DataFusionExecutor;
        use crate::observability::MemoryAuditLog;

        let temp = TempDir::new().unwrap();
        let engine = QueryEngine::new(
            Arc::new(DatasetStore::open(temp.path(), MIN_SAMPLE_ROWS).unwrap()),
            Arc::new(DataFusionExecutor::default()),
            Arc::new(MemoryAuditLog::new()),
            EngineConfig::default(),
        );
        let body: RunQueryBody =
            serde_json::from_value(json!({"dataset_id": 99, "spec": {"dataset_id": 99}}))
                .unwrap();

        let mut out = Vec::new();
        let err = execute_query(&engine, body, &mut out).await.unwrap_err();
        assert_eq!(err.code(), "DATASET_NOT_FOUND");
        assert_eq!(err.exit_code(), 2);

        let line: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(line["status"], "error");
        assert_eq!(line["code"], "DATASET_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_malformed_run_body_fails() {
        use crate::executor::DataFusionExecutor;
        use crate::observability::MemoryAuditLog;

        let temp = TempDir::new().unwrap();
        let engine = QueryEngine::new(
            Arc::new(DatasetStore::open(temp.path(), MIN_SAMPLE_ROWS).unwrap()),
            Arc::new(DataFusionExecutor::default()),
            Arc::new(MemoryAuditLog::new()),
            EngineConfig::default(),
        );
        let body = RunQueryBody {
            dataset_id: 1,
            spec: None,
            raw_sql: None,
        };

        let mut out = Vec::new();
        let err = execute_query(&engine, body, &mut out).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let line: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(line["code"], err.code());
    }

    #[test]
    fn test_boot_requires_init() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp.path().join("missing").to_str().unwrap().to_string(),
            ..Config::default()
        };
        let err = boot(&config).err().unwrap();
        assert_eq!(err.code(), "AEROQUERY_CLI_NOT_INITIALIZED");
    }
}
