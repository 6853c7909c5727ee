//! Purpose: Define the stable public Rust API boundary for varlens.
//! Exports: Core types and operations needed by the CLI, server, and tests.
//! Role: Public, additive-only surface; hides pipeline internals.
//! Invariants: This module is the only public path consumers should rely on.

mod client;
mod remote;
mod request;

pub use crate::core::dataset::{Dataset, DatasetStore};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::filter::{Constraint, Criteria};
pub use crate::core::order::{Direction, OrderKey};
pub use crate::core::page::PageRequest;
pub use crate::core::query::{QueryPayload, QueryRequest, query_column};
pub use crate::core::registry::{Kind, Registry};
pub use crate::core::value::{Value, ValueKind};
pub use client::{ColumnInfo, LocalClient};
pub use remote::{RemoteClient, RemoteQuery};
pub use request::{
    constraint_from_json, criteria_from_json, criteria_from_pairs, ordering_from_json,
    page_from_pairs,
};
