//! Purpose: Apply (column, direction) sort keys to a value sequence.
//! Exports: `Direction`, `OrderKey`, `apply_ordering`.
//! Role: Second pipeline stage, skipped entirely for entry modes without
//! ordering support.
//! Invariants: Each recognized key re-sorts the whole sequence by natural value
//! order, so the last key wins; keys naming unrecognized columns are no-ops.
//! Invariants: Mixed value kinds fail fast with `TypeMismatch` before sorting.

use crate::core::error::Error;
use crate::core::registry::Registry;
use crate::core::value::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    /// Wire directions are exactly `ASC` and `DESC`; anything else is dropped
    /// by the request decoder.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ASC" => Some(Direction::Asc),
            "DESC" => Some(Direction::Desc),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub column: String,
    pub direction: Direction,
}

impl OrderKey {
    pub fn new(column: impl Into<String>, direction: Direction) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

pub fn apply_ordering(
    values: Vec<Value>,
    keys: &[OrderKey],
    registry: &Registry,
) -> Result<Vec<Value>, Error> {
    let mut values = values;
    for key in keys {
        if registry.kind_of(&key.column).is_none() {
            continue;
        }
        ensure_homogeneous(&values)?;
        match key.direction {
            Direction::Asc => values.sort_by(|a, b| a.natural_cmp(b)),
            Direction::Desc => values.sort_by(|a, b| b.natural_cmp(a)),
        }
    }
    Ok(values)
}

fn ensure_homogeneous(values: &[Value]) -> Result<(), Error> {
    let mut iter = values.iter();
    let Some(first) = iter.next() else {
        return Ok(());
    };
    for value in iter {
        if value.kind() != first.kind() {
            // Surfaces the mismatch via the comparison error path.
            first.try_cmp(value)?;
        }
    }
    Ok(())
}
