//! Purpose: Provide the HTTP/JSON query server for varlens.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum-based server exposing the v0 column query endpoints.
//! Invariants: JSON envelopes and error kinds remain stable across v0.
//! Invariants: Loopback-only unless explicitly allowed.
//! Invariants: GET queries never apply ordering; POST queries do.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path as AxumPath, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use varlens::api::{
    DatasetStore, Error, ErrorKind, QueryRequest, Registry, criteria_from_json,
    criteria_from_pairs, ordering_from_json, page_from_pairs,
};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub data_path: PathBuf,
    pub registry_path: Option<PathBuf>,
    pub token: Option<String>,
    pub allow_non_loopback: bool,
    pub cors_origins: Vec<String>,
    pub max_body_bytes: u64,
}

struct AppState {
    store: DatasetStore,
    registry: Registry,
    token: Option<String>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;
    let cors = cors_layer(&config.cors_origins)?;

    let registry = match &config.registry_path {
        Some(path) => Registry::from_path(path)?,
        None => Registry::default(),
    };
    let store = DatasetStore::open(&config.data_path)?;

    tracing::info!(
        bind = %config.bind,
        data = %config.data_path.display(),
        columns = store.snapshot().len(),
        "serving dataset"
    );

    let state = Arc::new(AppState {
        store,
        registry,
        token: config.token,
    });

    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v0/columns", get(list_columns))
        .route("/v0/columns/:column/values", get(get_values).post(post_values))
        .route("/v0/reload", post(reload_dataset))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("server failed")
                .with_source(err)
        })
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }

    Ok(())
}

fn cors_layer(origins: &[String]) -> Result<Option<CorsLayer>, Error> {
    if origins.is_empty() {
        return Ok(None);
    }
    let mut values = Vec::with_capacity(origins.len());
    for origin in origins {
        let value = HeaderValue::from_str(origin).map_err(|_| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid CORS origin `{origin}`"))
                .with_hint("Use an origin like https://example.com.")
        })?;
        values.push(value);
    }
    Ok(Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(values))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    ))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), Error> {
    let Some(token) = state.token.as_ref() else {
        return Ok(());
    };
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(Error::new(ErrorKind::Permission).with_message("missing bearer token"));
    };
    let value = value.to_str().unwrap_or_default();
    let expected = format!("Bearer {token}");
    if value != expected {
        return Err(Error::new(ErrorKind::Permission).with_message("invalid bearer token"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    filters: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    ordering: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    column: Option<String>,
}

async fn healthz() -> Response {
    json_response(json!({ "ok": true }))
}

async fn list_columns(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let snapshot = state.store.snapshot();
    let mut out = Vec::new();
    for (column, kind) in state.registry.iter() {
        let mut entry = serde_json::Map::new();
        entry.insert("column".to_string(), json!(column));
        entry.insert("kind".to_string(), json!(kind.as_str()));
        if let Some(values) = snapshot.column_values(column) {
            entry.insert("values".to_string(), json!(values.len()));
        }
        out.push(serde_json::Value::Object(entry));
    }
    json_response(json!({ "columns": out }))
}

async fn get_values(
    State(state): State<Arc<AppState>>,
    AxumPath(column): AxumPath<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let page = match page_from_pairs(&pairs) {
        Ok(page) => page,
        Err(err) => return error_response(err),
    };
    let criteria = criteria_from_pairs(&pairs, &state.registry);
    let request = QueryRequest::new(column, page)
        .with_criteria(criteria)
        .without_ordering();
    run_query(&state, &request)
}

async fn post_values(
    State(state): State<Arc<AppState>>,
    AxumPath(column): AxumPath<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(body): Json<QueryBody>,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let page = match page_from_pairs(&pairs) {
        Ok(page) => page,
        Err(err) => return error_response(err),
    };
    let request = QueryRequest::new(column, page)
        .with_criteria(criteria_from_json(&body.filters))
        .with_ordering(ordering_from_json(&body.ordering));
    run_query(&state, &request)
}

async fn reload_dataset(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    match state.store.reload() {
        Ok(snapshot) => json_response(json!({ "ok": true, "columns": snapshot.len() })),
        Err(err) => error_response(err),
    }
}

fn run_query(state: &AppState, request: &QueryRequest) -> Response {
    let snapshot = state.store.snapshot();
    match varlens::api::query_column(&snapshot, &state.registry, request) {
        Ok(payload) => match serde_json::to_value(&payload) {
            Ok(body) => json_response(body),
            Err(err) => error_response(
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode payload")
                    .with_source(err),
            ),
        },
        Err(err) => error_response(err),
    }
}

fn json_response(payload: serde_json::Value) -> Response {
    let mut response = Json(payload).into_response();
    response
        .headers_mut()
        .insert("varlens-version", HeaderValue::from_static("0"));
    response
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        ErrorKind::Usage | ErrorKind::OutOfRange => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Permission => StatusCode::UNAUTHORIZED,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::TypeMismatch | ErrorKind::Io | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
            hint: err.hint().map(str::to_string),
            path: err.path().map(|path| path.to_string_lossy().to_string()),
            column: err.column().map(str::to_string),
        },
    };
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert("varlens-version", HeaderValue::from_static("0"));
    response
}
