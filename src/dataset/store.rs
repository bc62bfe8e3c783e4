//! Dataset Store
//!
//! Owns the on-disk layout under `<data_dir>/datasets`:
//!
//! ```text
//! datasets/
//!   index.json     last allocated id + dataset records
//!   1.csv
//!   2.json
//! ```
//!
//! Id allocation ("read last id, increment, write file, persist index") is
//! the only serialized mutation and runs under the index write lock.
//! Lookups clone an `Arc<Dataset>` under the read lock; records are never
//! mutated in place, only replaced.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::{DatasetError, DatasetResult};
use super::infer::{infer_schema, MIN_SAMPLE_ROWS};
use super::types::{Dataset, DatasetFormat, Schema};

const INDEX_FILE: &str = "index.json";

/// Outcome of a successful ingest.
///
/// `warning` is set when the file was stored but its schema could not be
/// inferred.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub dataset: Arc<Dataset>,
    pub warning: Option<DatasetError>,
}

#[derive(Debug, Default)]
struct DatasetIndex {
    last_id: u64,
    datasets: BTreeMap<u64, Arc<Dataset>>,
}

/// On-disk representation of the index
#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    last_id: u64,
    datasets: Vec<Dataset>,
}

/// Resolves dataset ids to files and schemas.
#[derive(Debug)]
pub struct DatasetStore {
    root: PathBuf,
    sample_rows: usize,
    index: RwLock<DatasetIndex>,
}

impl DatasetStore {
    /// Opens (or creates) the store under `data_dir`, reloading the index.
    ///
    /// A corrupt index is an error; it is never silently reset.
    pub fn open(data_dir: impl AsRef<Path>, sample_rows: usize) -> DatasetResult<Self> {
        let root = data_dir.as_ref().join("datasets");
        fs::create_dir_all(&root)?;

        let index_path = root.join(INDEX_FILE);
        let index = if index_path.exists() {
            let content = fs::read_to_string(&index_path)?;
            let file: IndexFile = serde_json::from_str(&content)
                .map_err(|e| DatasetError::CorruptIndex(e.to_string()))?;

            let max_id = file.datasets.iter().map(|d| d.id).max().unwrap_or(0);
            if max_id > file.last_id {
                return Err(DatasetError::CorruptIndex(format!(
                    "dataset id {} exceeds last allocated id {}",
                    max_id, file.last_id
                )));
            }

            DatasetIndex {
                last_id: file.last_id,
                datasets: file
                    .datasets
                    .into_iter()
                    .map(|d| (d.id, Arc::new(d)))
                    .collect(),
            }
        } else {
            DatasetIndex::default()
        };

        Ok(Self {
            root,
            sample_rows: sample_rows.max(MIN_SAMPLE_ROWS),
            index: RwLock::new(index),
        })
    }

    /// Directory holding dataset files
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores `bytes` under a freshly allocated id and infers its schema.
    pub fn ingest(
        &self,
        name: &str,
        format: DatasetFormat,
        bytes: &[u8],
    ) -> DatasetResult<Ingested> {
        let mut index = self.write_index()?;

        let id = index.last_id + 1;
        let path = self.root.join(format!("{}.{}", id, format.extension()));
        fs::write(&path, bytes)?;

        let (schema, warning) = match infer_schema(format, bytes, self.sample_rows) {
            Ok(schema) => (schema, None),
            Err(err) => (Schema::empty(), Some(err)),
        };

        let dataset = Arc::new(Dataset {
            id,
            name: name.to_string(),
            format,
            path: path.clone(),
            schema,
            content_version: content_version(bytes),
            size_bytes: bytes.len() as u64,
            created_at: Utc::now(),
            schema_error: warning.as_ref().map(|w| w.to_string()),
        });

        index.last_id = id;
        index.datasets.insert(id, Arc::clone(&dataset));

        if let Err(err) = self.persist(&index) {
            // Roll back so the in-memory index never runs ahead of disk
            index.datasets.remove(&id);
            index.last_id = id - 1;
            let _ = fs::remove_file(&path);
            return Err(err);
        }

        Ok(Ingested { dataset, warning })
    }

    /// Resolves a dataset id.
    pub fn resolve(&self, id: u64) -> DatasetResult<Arc<Dataset>> {
        self.read_index()?
            .datasets
            .get(&id)
            .cloned()
            .ok_or(DatasetError::NotFound(id))
    }

    /// All datasets ordered by id
    pub fn list(&self) -> DatasetResult<Vec<Arc<Dataset>>> {
        Ok(self.read_index()?.datasets.values().cloned().collect())
    }

    /// Re-samples the stored file and replaces the dataset record.
    ///
    /// On inference failure the existing record is kept.
    pub fn refresh_schema(&self, id: u64) -> DatasetResult<Arc<Dataset>> {
        let mut index = self.write_index()?;
        let current = index
            .datasets
            .get(&id)
            .cloned()
            .ok_or(DatasetError::NotFound(id))?;

        let bytes = fs::read(&current.path)?;
        let schema = infer_schema(current.format, &bytes, self.sample_rows)?;

        let refreshed = Arc::new(Dataset {
            schema,
            schema_error: None,
            content_version: content_version(&bytes),
            size_bytes: bytes.len() as u64,
            ..(*current).clone()
        });

        index.datasets.insert(id, Arc::clone(&refreshed));
        if let Err(err) = self.persist(&index) {
            index.datasets.insert(id, current);
            return Err(err);
        }

        Ok(refreshed)
    }

    fn persist(&self, index: &DatasetIndex) -> DatasetResult<()> {
        let file = IndexFile {
            last_id: index.last_id,
            datasets: index.datasets.values().map(|d| (**d).clone()).collect(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| DatasetError::IoError(e.to_string()))?;

        let target = self.root.join(INDEX_FILE);
        let tmp = self.root.join(format!("{}.tmp", INDEX_FILE));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    fn read_index(&self) -> DatasetResult<RwLockReadGuard<'_, DatasetIndex>> {
        self.index
            .read()
            .map_err(|_| DatasetError::IoError("dataset index lock poisoned".into()))
    }

    fn write_index(&self) -> DatasetResult<RwLockWriteGuard<'_, DatasetIndex>> {
        self.index
            .write()
            .map_err(|_| DatasetError::IoError("dataset index lock poisoned".into()))
    }
}

fn content_version(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
