//! Purpose: Compose registry lookup, filtering, ordering, and pagination into
//! one request-scoped pipeline.
//! Exports: `QueryRequest`, `QueryPayload`, `query_column`.
//! Role: Orchestrator; stateless, synchronous, idempotent per invocation.
//! Invariants: Ordering support is a capability flag on the request (GET entry
//! mode skips ordering), not duplicated pipeline logic.
//! Invariants: Component errors propagate untouched; the transport layer maps
//! them to status codes.

use serde::{Deserialize, Serialize};

use crate::core::dataset::Dataset;
use crate::core::error::{Error, ErrorKind};
use crate::core::filter::{Criteria, apply_filters};
use crate::core::order::{OrderKey, apply_ordering};
use crate::core::page::{PageRequest, paginate};
use crate::core::registry::Registry;
use crate::core::value::Value;

#[derive(Clone, Debug)]
pub struct QueryRequest {
    pub column: String,
    pub criteria: Criteria,
    pub ordering: Vec<OrderKey>,
    pub page: PageRequest,
    /// Entry-mode capability: GET requests never order, POST requests do.
    pub supports_ordering: bool,
}

impl QueryRequest {
    pub fn new(column: impl Into<String>, page: PageRequest) -> Self {
        Self {
            column: column.into(),
            criteria: Criteria::new(),
            ordering: Vec::new(),
            page,
            supports_ordering: true,
        }
    }

    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_ordering(mut self, ordering: Vec<OrderKey>) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn without_ordering(mut self) -> Self {
        self.supports_ordering = false;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryPayload {
    pub page: usize,
    pub page_size: usize,
    pub count: usize,
    pub results: Vec<Value>,
}

pub fn query_column(
    dataset: &Dataset,
    registry: &Registry,
    request: &QueryRequest,
) -> Result<QueryPayload, Error> {
    let Some(values) = dataset.column_values(&request.column) else {
        return Err(Error::new(ErrorKind::NotFound)
            .with_message("column not present in dataset")
            .with_column(&request.column)
            .with_hint("List servable columns with the columns endpoint."));
    };

    let mut values = values.to_vec();
    values = apply_filters(values, &request.criteria, registry);
    if request.supports_ordering {
        values = apply_ordering(values, &request.ordering, registry)?;
    }
    let page = paginate(values, &request.page)?;

    Ok(QueryPayload {
        page: request.page.page(),
        page_size: request.page.page_size(),
        count: page.total,
        results: page.values,
    })
}

#[cfg(test)]
mod tests {
    use super::{QueryRequest, query_column};
    use crate::core::dataset::Dataset;
    use crate::core::error::ErrorKind;
    use crate::core::filter::{Constraint, Criteria};
    use crate::core::order::{Direction, OrderKey};
    use crate::core::page::PageRequest;
    use crate::core::registry::Registry;
    use crate::core::value::Value;

    fn dataset() -> Dataset {
        Dataset::from_json_str(
            r#"{
                "main.uploaded_variation": {"unique_values": ["A", "B", "C", "D", "E"]},
                "main.af_vcf": {"unique_values": [10, 1, 5, 15]}
            }"#,
        )
        .expect("dataset")
    }

    fn page(page: usize, page_size: usize) -> PageRequest {
        PageRequest::new(page, page_size).expect("page request")
    }

    #[test]
    fn plain_query_pages_through_column_values() {
        let payload = query_column(
            &dataset(),
            &Registry::default(),
            &QueryRequest::new("main.uploaded_variation", page(2, 2)),
        )
        .expect("payload");
        assert_eq!(payload.page, 2);
        assert_eq!(payload.page_size, 2);
        assert_eq!(payload.count, 5);
        assert_eq!(payload.results, vec![Value::from("C"), Value::from("D")]);
    }

    #[test]
    fn unknown_requested_column_is_not_found() {
        let err = query_column(
            &dataset(),
            &Registry::default(),
            &QueryRequest::new("main.absent", page(1, 10)),
        )
        .expect_err("missing column");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn ordering_is_skipped_when_capability_is_off() {
        let registry = Registry::default();
        let ordering = vec![OrderKey::new("main.af_vcf", Direction::Asc)];

        let ordered = query_column(
            &dataset(),
            &registry,
            &QueryRequest::new("main.af_vcf", page(1, 10)).with_ordering(ordering.clone()),
        )
        .expect("ordered");
        assert_eq!(
            ordered.results,
            vec![
                Value::from(1.0),
                Value::from(5.0),
                Value::from(10.0),
                Value::from(15.0)
            ]
        );

        let unordered = query_column(
            &dataset(),
            &registry,
            &QueryRequest::new("main.af_vcf", page(1, 10))
                .with_ordering(ordering)
                .without_ordering(),
        )
        .expect("unordered");
        assert_eq!(
            unordered.results,
            vec![
                Value::from(10.0),
                Value::from(1.0),
                Value::from(5.0),
                Value::from(15.0)
            ]
        );
    }

    #[test]
    fn filter_then_paginate_reports_filtered_count() {
        let mut criteria = Criteria::new();
        criteria.insert("main.af_vcf".to_string(), Constraint::Range(4.0, 12.0));
        let payload = query_column(
            &dataset(),
            &Registry::default(),
            &QueryRequest::new("main.af_vcf", page(1, 10)).with_criteria(criteria),
        )
        .expect("payload");
        assert_eq!(payload.count, 2);
        assert_eq!(payload.results, vec![Value::from(10.0), Value::from(5.0)]);
    }

    #[test]
    fn filtered_out_everything_makes_page_one_out_of_range() {
        let mut criteria = Criteria::new();
        criteria.insert("main.af_vcf".to_string(), Constraint::Range(12.0, 4.0));
        let err = query_column(
            &dataset(),
            &Registry::default(),
            &QueryRequest::new("main.af_vcf", page(1, 10)).with_criteria(criteria),
        )
        .expect_err("empty set");
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }
}
