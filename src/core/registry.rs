//! Purpose: Classify columns by value kind for filter/order interpretation.
//! Exports: `Kind`, `Registry`.
//! Role: Immutable lookup table constructed at startup and passed by parameter.
//! Invariants: Lookup has no failure mode beyond "not found"; callers treat an
//! unrecognized column as "ignore this criterion", never as an error.
//! Invariants: The registry is never mutated after construction.

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    Enum,
    Numeric,
    FreeText,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Enum => "ENUM",
            Kind::Numeric => "NUMERIC",
            Kind::FreeText => "FREE_TEXT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ENUM" => Some(Kind::Enum),
            "NUMERIC" => Some(Kind::Numeric),
            "FREE_TEXT" => Some(Kind::FreeText),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Registry {
    kinds: BTreeMap<String, Kind>,
}

impl Registry {
    pub fn new(kinds: BTreeMap<String, Kind>) -> Self {
        Self { kinds }
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Kind)>,
        S: Into<String>,
    {
        Self {
            kinds: entries
                .into_iter()
                .map(|(column, kind)| (column.into(), kind))
                .collect(),
        }
    }

    /// Load a registry from a JSON file of the form `{"<column>": "<KIND>"}`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read registry file")
                .with_path(path)
                .with_source(err)
        })?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&raw).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("registry file is not a JSON object of column kinds")
                .with_path(path)
                .with_source(err)
        })?;
        let mut kinds = BTreeMap::new();
        for (column, kind) in entries {
            let Some(kind) = Kind::parse(&kind) else {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("unknown column kind `{kind}`"))
                    .with_column(column)
                    .with_path(path)
                    .with_hint("Use one of ENUM, NUMERIC, FREE_TEXT."));
            };
            kinds.insert(column, kind);
        }
        Ok(Self { kinds })
    }

    pub fn kind_of(&self, column: &str) -> Option<Kind> {
        self.kinds.get(column).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Kind)> {
        self.kinds.iter().map(|(column, kind)| (column.as_str(), *kind))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for Registry {
    /// Built-in column table for the variant annotation dataset this service
    /// was first deployed against.
    fn default() -> Self {
        Self::from_entries([
            ("main.uploaded_variation", Kind::Enum),
            ("main.existing_variation", Kind::Enum),
            ("main.symbol", Kind::Enum),
            ("main.af_vcf", Kind::Numeric),
            ("main.dp", Kind::Numeric),
            ("details2.dann_score", Kind::Numeric),
            ("links.mondo", Kind::FreeText),
            ("links.pheno pubmed", Kind::FreeText),
            ("details2.provean", Kind::FreeText),
        ])
    }
}
