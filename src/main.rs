//! Purpose: `varlens` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Non-interactive errors are emitted as a JSON envelope on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::aot::Shell;
use serde_json::json;

mod serve;

use varlens::api::{
    Criteria, Direction, Error, ErrorKind, LocalClient, OrderKey, PageRequest, QueryRequest,
    Registry, RemoteClient, RemoteQuery, criteria_from_pairs, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

#[derive(Parser)]
#[command(name = "varlens", version, about = "Query columnar annotation datasets over HTTP")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP query server over a dataset file.
    Serve {
        /// Path to the dataset JSON file.
        #[arg(long)]
        data: PathBuf,
        /// Optional column registry JSON file (defaults to the built-in table).
        #[arg(long)]
        registry: Option<PathBuf>,
        /// Bind address.
        #[arg(long, default_value = "127.0.0.1:9610")]
        bind: String,
        /// Allow binding to a non-loopback address.
        #[arg(long)]
        allow_non_loopback: bool,
        /// Require this bearer token on every request.
        #[arg(long, conflicts_with = "token_file")]
        token: Option<String>,
        /// Read the bearer token from a file.
        #[arg(long)]
        token_file: Option<PathBuf>,
        /// Allowed CORS origin (repeatable).
        #[arg(long = "cors-origin")]
        cors_origins: Vec<String>,
        /// Maximum request body size in bytes.
        #[arg(long, default_value_t = 1024 * 1024)]
        max_body_bytes: u64,
    },
    /// Query a column's values locally or against a running server.
    Query {
        /// Column identifier, e.g. `main.af_vcf`.
        column: String,
        /// Path to a local dataset JSON file.
        #[arg(long, conflicts_with = "url")]
        data: Option<PathBuf>,
        /// Base URL of a running varlens server.
        #[arg(long)]
        url: Option<String>,
        /// Optional column registry JSON file (local mode only).
        #[arg(long)]
        registry: Option<PathBuf>,
        /// Filter criterion as `column=value` (repeatable).
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// Order key as `column:asc` or `column:desc` (repeatable).
        #[arg(long = "order")]
        orders: Vec<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        page_size: usize,
        /// Bearer token for remote queries.
        #[arg(long, conflicts_with = "token_file")]
        token: Option<String>,
        /// Read the bearer token from a file.
        #[arg(long)]
        token_file: Option<PathBuf>,
    },
    /// List registry columns, with value counts when a dataset is given.
    Columns {
        /// Path to a local dataset JSON file.
        #[arg(long, conflicts_with = "url")]
        data: Option<PathBuf>,
        /// Base URL of a running varlens server.
        #[arg(long)]
        url: Option<String>,
        /// Optional column registry JSON file (local mode only).
        #[arg(long)]
        registry: Option<PathBuf>,
        /// Bearer token for remote listings.
        #[arg(long)]
        token: Option<String>,
    },
    /// Generate shell completions.
    Completion { shell: Shell },
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<RunOutcome, Error> {
    match cli.command {
        Command::Serve {
            data,
            registry,
            bind,
            allow_non_loopback,
            token,
            token_file,
            cors_origins,
            max_body_bytes,
        } => {
            let bind: SocketAddr = bind.parse().map_err(|_| {
                Error::new(ErrorKind::Usage)
                    .with_message("invalid bind address")
                    .with_hint("Use a host:port value like 127.0.0.1:9610.")
            })?;
            let token = resolve_token(token, token_file)?;
            let config = serve::ServeConfig {
                bind,
                data_path: data,
                registry_path: registry,
                token,
                allow_non_loopback,
                cors_origins,
                max_body_bytes,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
        Command::Query {
            column,
            data,
            url,
            registry,
            filters,
            orders,
            page,
            page_size,
            token,
            token_file,
        } => {
            let page = PageRequest::new(page, page_size)?;
            let filter_pairs = parse_filter_args(&filters)?;
            let ordering = parse_order_args(&orders)?;
            let payload = match (data, url) {
                (Some(data), None) => {
                    let mut client = LocalClient::open(data)?;
                    if let Some(path) = registry {
                        client = client.with_registry(Registry::from_path(path)?);
                    }
                    let criteria = criteria_from_pairs(&filter_pairs, client.registry());
                    let request = QueryRequest::new(column, page)
                        .with_criteria(criteria)
                        .with_ordering(ordering);
                    client.query(&request)?
                }
                (None, Some(url)) => {
                    let client = remote_client(url, token, token_file)?;
                    if ordering.is_empty() {
                        let pairs: Vec<(&str, &str)> = filter_pairs
                            .iter()
                            .map(|(key, value)| (key.as_str(), value.as_str()))
                            .collect();
                        client.values(&column, &page, &pairs)?
                    } else {
                        // Type-convert filters with the server's own registry.
                        let criteria = remote_criteria(&client, &filter_pairs)?;
                        let query = RemoteQuery {
                            page,
                            criteria,
                            ordering,
                        };
                        client.query(&column, &query)?
                    }
                }
                _ => {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message("query requires a data source")
                        .with_hint("Provide --data FILE or --url BASE_URL."));
                }
            };
            emit_json(&serde_json::to_value(&payload).map_err(encode_error)?);
            Ok(RunOutcome::ok())
        }
        Command::Columns {
            data,
            url,
            registry,
            token,
        } => {
            let columns = match (data, url) {
                (Some(data), None) => {
                    let mut client = LocalClient::open(data)?;
                    if let Some(path) = registry {
                        client = client.with_registry(Registry::from_path(path)?);
                    }
                    client.columns()
                }
                (None, Some(url)) => {
                    let mut client = RemoteClient::new(url)?;
                    if let Some(token) = token {
                        client = client.with_token(token);
                    }
                    client.columns()?
                }
                (None, None) => {
                    let registry = match registry {
                        Some(path) => Registry::from_path(path)?,
                        None => Registry::default(),
                    };
                    registry
                        .iter()
                        .map(|(column, kind)| varlens::api::ColumnInfo {
                            column: column.to_string(),
                            kind,
                            values: None,
                        })
                        .collect()
                }
                _ => {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message("columns accepts --data or --url, not both"));
                }
            };
            let entries: Vec<serde_json::Value> = columns
                .iter()
                .map(|info| {
                    let mut entry = serde_json::Map::new();
                    entry.insert("column".to_string(), json!(info.column));
                    entry.insert("kind".to_string(), json!(info.kind.as_str()));
                    if let Some(values) = info.values {
                        entry.insert("values".to_string(), json!(values));
                    }
                    serde_json::Value::Object(entry)
                })
                .collect();
            emit_json(&json!({ "columns": entries }));
            Ok(RunOutcome::ok())
        }
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "varlens", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
    }
}

fn parse_filter_args(filters: &[String]) -> Result<Vec<(String, String)>, Error> {
    filters
        .iter()
        .map(|raw| {
            raw.split_once('=')
                .map(|(column, value)| (column.to_string(), value.to_string()))
                .ok_or_else(|| {
                    Error::new(ErrorKind::Usage)
                        .with_message(format!("invalid filter `{raw}`"))
                        .with_hint("Use --filter column=value.")
                })
        })
        .collect()
}

fn parse_order_args(orders: &[String]) -> Result<Vec<OrderKey>, Error> {
    orders
        .iter()
        .map(|raw| {
            let parsed = raw.rsplit_once(':').and_then(|(column, direction)| {
                Direction::parse(&direction.to_ascii_uppercase())
                    .map(|direction| OrderKey::new(column, direction))
            });
            parsed.ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid order key `{raw}`"))
                    .with_hint("Use --order column:asc or --order column:desc.")
            })
        })
        .collect()
}

fn remote_client(
    url: String,
    token: Option<String>,
    token_file: Option<PathBuf>,
) -> Result<RemoteClient, Error> {
    let mut client = RemoteClient::new(url)?;
    if let Some(token) = resolve_token(token, token_file)? {
        client = client.with_token(token);
    }
    Ok(client)
}

fn remote_criteria(
    client: &RemoteClient,
    filter_pairs: &[(String, String)],
) -> Result<Criteria, Error> {
    let registry = Registry::from_entries(
        client
            .columns()?
            .into_iter()
            .map(|info| (info.column, info.kind)),
    );
    Ok(criteria_from_pairs(filter_pairs, &registry))
}

fn resolve_token(
    token: Option<String>,
    token_file: Option<PathBuf>,
) -> Result<Option<String>, Error> {
    match (token, token_file) {
        (Some(token), None) => Ok(Some(token)),
        (None, Some(path)) => {
            let raw = std::fs::read_to_string(&path).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read token file")
                    .with_path(&path)
                    .with_source(err)
            })?;
            Ok(Some(raw.trim().to_string()))
        }
        (None, None) => Ok(None),
        (Some(_), Some(_)) => Err(Error::new(ErrorKind::Usage)
            .with_message("use --token or --token-file, not both")),
    }
}

fn emit_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(_) => println!("{value}"),
    }
}

fn emit_error(err: &Error) {
    let mut body = serde_json::Map::new();
    body.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    body.insert(
        "message".to_string(),
        json!(err.message().unwrap_or("error")),
    );
    if let Some(hint) = err.hint() {
        body.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        body.insert("path".to_string(), json!(path.to_string_lossy()));
    }
    if let Some(column) = err.column() {
        body.insert("column".to_string(), json!(column));
    }
    let envelope = json!({ "error": body });
    eprintln!("{envelope}");
}

fn encode_error(err: serde_json::Error) -> Error {
    Error::new(ErrorKind::Internal)
        .with_message("failed to encode payload")
        .with_source(err)
}
