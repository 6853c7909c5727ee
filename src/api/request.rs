//! Purpose: Decode wire-format request inputs into typed pipeline inputs.
//! Exports: `page_from_pairs`, `criteria_from_pairs`, `criteria_from_json`,
//! `constraint_from_json`, `ordering_from_json`.
//! Role: Request-decoder collaborator; owns all type conversion so the core
//! only ever sees already-typed constraints.
//! Invariants: Constraint shapes that cannot be converted become `Unsupported`
//! (engine no-ops), matching the pipeline's permissiveness contract.
//! Invariants: Ordering entries with unknown directions are dropped, not errors.

use crate::core::error::{Error, ErrorKind};
use crate::core::filter::{Constraint, Criteria};
use crate::core::order::{Direction, OrderKey};
use crate::core::page::PageRequest;
use crate::core::registry::{Kind, Registry};

/// Query-string keys consumed by pagination, never treated as filter columns.
const RESERVED_KEYS: [&str; 2] = ["page", "page_size"];

/// Extract `page`/`page_size` from query pairs, defaulting to 1 and 10.
pub fn page_from_pairs(pairs: &[(String, String)]) -> Result<PageRequest, Error> {
    let page = parse_page_value(pairs, "page", 1)?;
    let page_size = parse_page_value(pairs, "page_size", 10)?;
    PageRequest::new(page, page_size)
}

fn parse_page_value(
    pairs: &[(String, String)],
    key: &str,
    default: usize,
) -> Result<usize, Error> {
    let Some((_, raw)) = pairs.iter().find(|(name, _)| name == key) else {
        return Ok(default);
    };
    raw.parse::<usize>().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("{key} must be a positive integer"))
            .with_hint(format!("Got `{raw}`."))
    })
}

/// Build criteria from GET query pairs. Values for numeric columns are
/// converted to exact (`"3.5"`) or range (`"4,12"`) constraints; everything
/// else stays a text constraint, which numeric columns no-op.
pub fn criteria_from_pairs(pairs: &[(String, String)], registry: &Registry) -> Criteria {
    let mut criteria = Criteria::new();
    for (column, raw) in pairs {
        if RESERVED_KEYS.contains(&column.as_str()) {
            continue;
        }
        let constraint = match registry.kind_of(column) {
            Some(Kind::Numeric) => numeric_constraint_from_str(raw),
            _ => Constraint::Text(raw.clone()),
        };
        criteria.insert(column.clone(), constraint);
    }
    criteria
}

fn numeric_constraint_from_str(raw: &str) -> Constraint {
    if let Ok(number) = raw.trim().parse::<f64>() {
        return Constraint::Number(number);
    }
    if let Some((low, high)) = raw.split_once(',') {
        if let (Ok(low), Ok(high)) = (low.trim().parse::<f64>(), high.trim().parse::<f64>()) {
            return Constraint::Range(low, high);
        }
    }
    Constraint::Unsupported
}

/// Build criteria from a POST body `filters` object.
pub fn criteria_from_json(filters: &serde_json::Map<String, serde_json::Value>) -> Criteria {
    filters
        .iter()
        .map(|(column, value)| (column.clone(), constraint_from_json(value)))
        .collect()
}

pub fn constraint_from_json(value: &serde_json::Value) -> Constraint {
    match value {
        serde_json::Value::String(text) => Constraint::Text(text.clone()),
        serde_json::Value::Number(number) => number
            .as_f64()
            .map(Constraint::Number)
            .unwrap_or(Constraint::Unsupported),
        serde_json::Value::Array(items) => {
            if let [low, high] = items.as_slice() {
                if let (Some(low), Some(high)) = (low.as_f64(), high.as_f64()) {
                    return Constraint::Range(low, high);
                }
            }
            Constraint::Unsupported
        }
        _ => Constraint::Unsupported,
    }
}

/// Flatten a POST body `ordering` array (`[{"col": "ASC"}, ...]`) into keys.
/// Non-string or unknown directions are dropped.
pub fn ordering_from_json(ordering: &[serde_json::Map<String, serde_json::Value>]) -> Vec<OrderKey> {
    let mut keys = Vec::new();
    for entry in ordering {
        for (column, direction) in entry {
            let Some(direction) = direction.as_str().and_then(Direction::parse) else {
                continue;
            };
            keys.push(OrderKey::new(column.clone(), direction));
        }
    }
    keys
}
