//! Purpose: Local query client over a dataset file.
//! Exports: `LocalClient`, `ColumnInfo`.
//! Role: Stable boundary for the CLI and tests; mirrors the server's query
//! semantics without the HTTP layer.
//! Invariants: Queries run against an immutable snapshot resolved per call.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::dataset::{Dataset, DatasetStore};
use crate::core::error::Error;
use crate::core::query::{QueryPayload, QueryRequest, query_column};
use crate::core::registry::{Kind, Registry};

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub column: String,
    pub kind: Kind,
    /// Distinct value count, when a dataset is attached.
    pub values: Option<usize>,
}

#[derive(Debug)]
pub struct LocalClient {
    registry: Registry,
    store: DatasetStore,
}

impl LocalClient {
    pub fn open(data_path: impl Into<PathBuf>) -> ApiResult<Self> {
        Ok(Self {
            registry: Registry::default(),
            store: DatasetStore::open(data_path)?,
        })
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn data_path(&self) -> &Path {
        self.store.path()
    }

    pub fn snapshot(&self) -> Arc<Dataset> {
        self.store.snapshot()
    }

    pub fn reload(&self) -> ApiResult<()> {
        self.store.reload().map(|_| ())
    }

    pub fn query(&self, request: &QueryRequest) -> ApiResult<QueryPayload> {
        let snapshot = self.store.snapshot();
        query_column(&snapshot, &self.registry, request)
    }

    /// Registry listing enriched with per-column value counts from the dataset.
    pub fn columns(&self) -> Vec<ColumnInfo> {
        let snapshot = self.store.snapshot();
        self.registry
            .iter()
            .map(|(column, kind)| ColumnInfo {
                column: column.to_string(),
                kind,
                values: snapshot.column_values(column).map(<[_]>::len),
            })
            .collect()
    }
}
