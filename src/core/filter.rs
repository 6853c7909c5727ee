//! Purpose: Apply column-keyed constraints to a value sequence.
//! Exports: `Constraint`, `Criteria`, `apply_filters`.
//! Role: First pipeline stage; a pure predicate intersection over the input.
//! Invariants: Unrecognized columns and malformed constraint shapes are no-ops.
//! Invariants: Filtering never fails and preserves input order (stable).

use std::collections::BTreeMap;

use crate::core::registry::{Kind, Registry};
use crate::core::value::Value;

/// One filter constraint. The shape a column accepts depends on its kind;
/// shapes that do not fit the column's kind are ignored by the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    /// Substring containment for enum and free-text columns.
    Text(String),
    /// Exact match for numeric columns.
    Number(f64),
    /// Inclusive `[low, high]` range for numeric columns.
    Range(f64, f64),
    /// Anything else seen on the wire; retained so the engine can no-op it.
    Unsupported,
}

impl Constraint {
    /// Wire form of the constraint, `None` for shapes that never apply.
    pub fn to_wire(&self) -> Option<serde_json::Value> {
        match self {
            Constraint::Text(needle) => Some(serde_json::Value::from(needle.as_str())),
            Constraint::Number(number) => Some(serde_json::json!(number)),
            Constraint::Range(low, high) => Some(serde_json::json!([low, high])),
            Constraint::Unsupported => None,
        }
    }
}

/// Criteria iterate in column order; the result is order-independent since
/// each criterion is an independent predicate.
pub type Criteria = BTreeMap<String, Constraint>;

pub fn apply_filters(values: Vec<Value>, criteria: &Criteria, registry: &Registry) -> Vec<Value> {
    let mut values = values;
    for (column, constraint) in criteria {
        let Some(kind) = registry.kind_of(column) else {
            continue;
        };
        match (kind, constraint) {
            (Kind::Enum | Kind::FreeText, Constraint::Text(needle)) => {
                values.retain(|value| {
                    value
                        .as_text()
                        .is_some_and(|text| text.contains(needle.as_str()))
                });
            }
            (Kind::Numeric, Constraint::Number(expected)) => {
                values.retain(|value| value.as_number().is_some_and(|n| n == *expected));
            }
            (Kind::Numeric, Constraint::Range(low, high)) => {
                values.retain(|value| {
                    value
                        .as_number()
                        .is_some_and(|n| *low <= n && n <= *high)
                });
            }
            // Constraint shape does not fit the column kind.
            _ => {}
        }
    }
    values
}
