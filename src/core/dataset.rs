//! Purpose: Load the backing dataset file and hold the serving snapshot.
//! Exports: `Dataset`, `DatasetStore`.
//! Role: Data-source collaborator; the pipeline only ever sees an immutable
//! snapshot resolved per request.
//! Invariants: A missing or unparsable file is `Unavailable`, never a filter result.
//! Invariants: Reload builds the new snapshot off-lock and swaps it atomically;
//! a failed reload leaves the previous snapshot serving.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;

use crate::core::error::{Error, ErrorKind};
use crate::core::value::Value;

#[derive(Debug, Deserialize)]
struct ColumnEntry {
    unique_values: Vec<Value>,
}

/// Immutable in-memory dataset: column id to its distinct values, in file order.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    columns: BTreeMap<String, Vec<Value>>,
}

impl Dataset {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Unavailable)
                .with_message("failed to read dataset file")
                .with_path(path)
                .with_source(err)
        })?;
        Self::from_json_str(&raw).map_err(|err| err.with_path(path))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, Error> {
        let entries: BTreeMap<String, ColumnEntry> =
            serde_json::from_str(raw).map_err(|err| {
                Error::new(ErrorKind::Unavailable)
                    .with_message("dataset JSON cannot be loaded")
                    .with_source(err)
            })?;
        Ok(Self {
            columns: entries
                .into_iter()
                .map(|(column, entry)| (column, entry.unique_values))
                .collect(),
        })
    }

    pub fn column_values(&self, column: &str) -> Option<&[Value]> {
        self.columns.get(column).map(Vec::as_slice)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns
            .iter()
            .map(|(column, values)| (column.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Holds the current dataset snapshot for a serving process. Readers grab an
/// `Arc` and keep it for the whole request; reload swaps the pointer.
#[derive(Debug)]
pub struct DatasetStore {
    path: PathBuf,
    current: RwLock<Arc<Dataset>>,
}

impl DatasetStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let dataset = Dataset::from_path(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(dataset)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<Dataset> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reload(&self) -> Result<Arc<Dataset>, Error> {
        let dataset = Arc::new(Dataset::from_path(&self.path)?);
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = dataset.clone();
        Ok(dataset)
    }
}
