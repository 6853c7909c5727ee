//! Purpose: HTTP client for the varlens v0 protocol.
//! Exports: `RemoteClient`, `RemoteQuery`.
//! Role: Transport client that mirrors local query operations remotely.
//! Invariants: Request and response envelopes match the server's v0 shapes.
//! Invariants: Error envelopes round-trip to the same `ErrorKind` taxonomy.
#![allow(clippy::result_large_err)]

use serde::Deserialize;
use url::Url;

use crate::core::error::{Error, ErrorKind};
use crate::core::filter::Criteria;
use crate::core::order::OrderKey;
use crate::core::page::PageRequest;
use crate::core::query::QueryPayload;
use crate::core::registry::Kind;

use super::client::ColumnInfo;

type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Debug)]
pub struct RemoteClient {
    base_url: Url,
    token: Option<String>,
    agent: ureq::Agent,
}

/// Typed query to send over the wire; serialized into the POST body plus
/// query-string pagination.
#[derive(Clone, Debug)]
pub struct RemoteQuery {
    pub page: PageRequest,
    pub criteria: Criteria,
    pub ordering: Vec<OrderKey>,
}

impl RemoteQuery {
    pub fn new(page: PageRequest) -> Self {
        Self {
            page,
            criteria: Criteria::new(),
            ordering: Vec::new(),
        }
    }

    fn body(&self) -> serde_json::Value {
        let mut filters = serde_json::Map::new();
        for (column, constraint) in &self.criteria {
            if let Some(wire) = constraint.to_wire() {
                filters.insert(column.clone(), wire);
            }
        }
        let ordering: Vec<serde_json::Value> = self
            .ordering
            .iter()
            .map(|key| {
                let mut entry = serde_json::Map::new();
                entry.insert(
                    key.column.clone(),
                    serde_json::Value::from(key.direction.as_str()),
                );
                serde_json::Value::Object(entry)
            })
            .collect();
        serde_json::json!({ "filters": filters, "ordering": ordering })
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
    kind: String,
    message: Option<String>,
    hint: Option<String>,
}

#[derive(Deserialize)]
struct ColumnsEnvelope {
    columns: Vec<RemoteColumn>,
}

#[derive(Deserialize)]
struct RemoteColumn {
    column: String,
    kind: String,
    values: Option<usize>,
}

#[derive(Deserialize)]
struct ReloadEnvelope {
    columns: usize,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            token: None,
            agent: ureq::AgentBuilder::new().build(),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn health(&self) -> ApiResult<()> {
        let url = self.endpoint(&["healthz"])?;
        self.read_body(self.request("GET", &url).call())?;
        Ok(())
    }

    pub fn columns(&self) -> ApiResult<Vec<ColumnInfo>> {
        let url = self.endpoint(&["v0", "columns"])?;
        let body = self.read_body(self.request("GET", &url).call())?;
        let envelope: ColumnsEnvelope = decode_json(&body)?;
        envelope
            .columns
            .into_iter()
            .map(|entry| {
                let Some(kind) = Kind::parse(&entry.kind) else {
                    return Err(Error::new(ErrorKind::Internal)
                        .with_message(format!("server returned unknown column kind `{}`", entry.kind)));
                };
                Ok(ColumnInfo {
                    column: entry.column,
                    kind,
                    values: entry.values,
                })
            })
            .collect()
    }

    /// GET query: raw filter pairs, no ordering (the server ignores ordering
    /// on this entry mode by contract).
    pub fn values(
        &self,
        column: &str,
        page: &PageRequest,
        filters: &[(&str, &str)],
    ) -> ApiResult<QueryPayload> {
        let mut url = self.endpoint(&["v0", "columns", column, "values"])?;
        append_page(&mut url, page);
        for (key, value) in filters {
            url.query_pairs_mut().append_pair(key, value);
        }
        let body = self.read_body(self.request("GET", &url).call())?;
        decode_json(&body)
    }

    /// POST query: typed filters and ordering in the JSON body.
    pub fn query(&self, column: &str, query: &RemoteQuery) -> ApiResult<QueryPayload> {
        let mut url = self.endpoint(&["v0", "columns", column, "values"])?;
        append_page(&mut url, &query.page);
        let payload = serde_json::to_string(&query.body()).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode query body")
                .with_source(err)
        })?;
        let body = self.read_body(
            self.request("POST", &url)
                .set("content-type", "application/json")
                .send_string(&payload),
        )?;
        decode_json(&body)
    }

    /// Ask the server to re-read its dataset file; returns the new column count.
    pub fn reload(&self) -> ApiResult<usize> {
        let url = self.endpoint(&["v0", "reload"])?;
        let body = self.read_body(
            self.request("POST", &url)
                .set("content-type", "application/json")
                .send_string("{}"),
        )?;
        let envelope: ReloadEnvelope = decode_json(&body)?;
        Ok(envelope.columns)
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                Error::new(ErrorKind::Usage).with_message("base URL cannot carry path segments")
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: &str, url: &Url) -> ureq::Request {
        let mut request = self.agent.request(method, url.as_str());
        if let Some(token) = &self.token {
            request = request.set("authorization", &format!("Bearer {token}"));
        }
        request
    }

    fn read_body(&self, result: Result<ureq::Response, ureq::Error>) -> ApiResult<String> {
        match result {
            Ok(response) => response.into_string().map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read server response")
                    .with_source(err)
            }),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(decode_error_envelope(status, &body))
            }
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("failed to reach server")
                .with_source(err)),
        }
    }
}

fn append_page(url: &mut Url, page: &PageRequest) {
    url.query_pairs_mut()
        .append_pair("page", &page.page().to_string())
        .append_pair("page_size", &page.page_size().to_string());
}

fn normalize_base_url(base_url: String) -> ApiResult<Url> {
    let url = Url::parse(&base_url).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid base URL")
            .with_hint("Use a value like http://127.0.0.1:9610.")
            .with_source(err)
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("base URL must use http or https"));
    }
    Ok(url)
}

fn decode_json<T: serde::de::DeserializeOwned>(body: &str) -> ApiResult<T> {
    serde_json::from_str(body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("server returned a malformed response")
            .with_source(err)
    })
}

fn decode_error_envelope(status: u16, body: &str) -> Error {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let mut err = Error::new(error_kind_from_name(&envelope.error.kind)).with_message(
                envelope
                    .error
                    .message
                    .unwrap_or_else(|| "server error".to_string()),
            );
            if let Some(hint) = envelope.error.hint {
                err = err.with_hint(hint);
            }
            err
        }
        Err(_) => Error::new(ErrorKind::Internal)
            .with_message(format!("server returned status {status} without an error envelope")),
    }
}

fn error_kind_from_name(name: &str) -> ErrorKind {
    match name {
        "Usage" => ErrorKind::Usage,
        "NotFound" => ErrorKind::NotFound,
        "Permission" => ErrorKind::Permission,
        "Unavailable" => ErrorKind::Unavailable,
        "OutOfRange" => ErrorKind::OutOfRange,
        "TypeMismatch" => ErrorKind::TypeMismatch,
        "Io" => ErrorKind::Io,
        _ => ErrorKind::Internal,
    }
}
