//! Purpose: End-to-end tests for the HTTP query server and remote client.
//! Exports: None (integration test module).
//! Role: Validate the v0 endpoints, error mapping, and the GET/POST ordering
//! asymmetry across a real TCP boundary.
//! Invariants: Uses loopback-only servers with temp dataset files.
//! Invariants: Bounded waits avoid test flakiness.
//! Invariants: Server processes are cleaned up on drop.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::thread::sleep;
use std::time::{Duration, Instant};

use varlens::api::{
    Direction, ErrorKind, Kind, OrderKey, PageRequest, RemoteClient, RemoteQuery, Value,
};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

static SERVER_LOCK: Mutex<()> = Mutex::new(());

const SAMPLE_DATA: &str = r#"{
    "main.uploaded_variation": {"unique_values": ["A", "B", "C", "D", "E"]},
    "main.af_vcf": {"unique_values": [10, 1, 5, 15]},
    "main.symbol": {"unique_values": ["BRCA1", "BRCA2", "TP53"]}
}"#;

struct TestServer {
    child: Child,
    base_url: String,
    data_path: PathBuf,
    token: Option<String>,
    _server_guard: MutexGuard<'static, ()>,
}

impl TestServer {
    fn start(dir: &Path) -> TestResult<Self> {
        Self::start_with_token(dir, None)
    }

    fn start_with_token(dir: &Path, token: Option<&str>) -> TestResult<Self> {
        let guard = SERVER_LOCK
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let data_path = dir.join("sample_data.json");
        std::fs::write(&data_path, SAMPLE_DATA)?;

        let mut last_err: Option<Box<dyn std::error::Error>> = None;
        for _attempt in 0..3 {
            let port = pick_port()?;
            let bind = format!("127.0.0.1:{port}");
            let base_url = format!("http://{bind}");

            let mut command = Command::new(env!("CARGO_BIN_EXE_varlens"));
            command
                .arg("serve")
                .arg("--data")
                .arg(&data_path)
                .arg("--bind")
                .arg(&bind)
                .stdout(Stdio::null())
                .stderr(Stdio::piped());
            if let Some(token) = token {
                command.arg("--token").arg(token);
            }
            let mut child = command.spawn()?;

            match wait_for_server(&mut child, bind.parse()?) {
                Ok(()) => {
                    return Ok(Self {
                        child,
                        base_url,
                        data_path,
                        token: token.map(str::to_string),
                        _server_guard: guard,
                    });
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    last_err = Some(err);
                    sleep(Duration::from_millis(30));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| "server failed to start".into()))
    }

    fn client(&self) -> TestResult<RemoteClient> {
        let mut client = RemoteClient::new(self.base_url.clone())?;
        if let Some(token) = &self.token {
            client = client.with_token(token.clone());
        }
        Ok(client)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn pick_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

fn wait_for_server(child: &mut Child, addr: SocketAddr) -> TestResult<()> {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(status) = child.try_wait()? {
            return Err(format!("server exited early with {status}").into());
        }
        if TcpStream::connect_timeout(&addr, Duration::from_millis(100)).is_ok() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err("server did not start listening in time".into());
        }
        sleep(Duration::from_millis(30));
    }
}

fn page(page: usize, page_size: usize) -> PageRequest {
    PageRequest::new(page, page_size).expect("valid page request")
}

fn numbers(items: &[f64]) -> Vec<Value> {
    items.iter().map(|item| Value::from(*item)).collect()
}

#[test]
fn get_values_pages_and_counts() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;
    let client = server.client()?;

    let payload = client.values("main.uploaded_variation", &page(2, 2), &[])?;
    assert_eq!(payload.page, 2);
    assert_eq!(payload.page_size, 2);
    assert_eq!(payload.count, 5);
    assert_eq!(payload.results, vec![Value::from("C"), Value::from("D")]);
    Ok(())
}

#[test]
fn get_applies_numeric_range_filter_from_query_pairs() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;
    let client = server.client()?;

    let payload = client.values("main.af_vcf", &page(1, 10), &[("main.af_vcf", "4,12")])?;
    assert_eq!(payload.count, 2);
    assert_eq!(payload.results, numbers(&[10.0, 5.0]));
    Ok(())
}

#[test]
fn get_never_orders_but_post_does() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;
    let client = server.client()?;

    let via_get = client.values("main.af_vcf", &page(1, 10), &[])?;
    assert_eq!(via_get.results, numbers(&[10.0, 1.0, 5.0, 15.0]));

    let mut query = RemoteQuery::new(page(1, 10));
    query.ordering = vec![OrderKey::new("main.af_vcf", Direction::Desc)];
    let via_post = client.query("main.af_vcf", &query)?;
    assert_eq!(via_post.results, numbers(&[15.0, 10.0, 5.0, 1.0]));
    Ok(())
}

#[test]
fn post_with_empty_body_sections_matches_get() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;
    let client = server.client()?;

    let via_post = client.query("main.uploaded_variation", &RemoteQuery::new(page(1, 3)))?;
    let via_get = client.values("main.uploaded_variation", &page(1, 3), &[])?;
    assert_eq!(via_post, via_get);
    Ok(())
}

#[test]
fn page_past_end_is_out_of_range() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;
    let client = server.client()?;

    let err = client
        .values("main.symbol", &page(3, 2), &[])
        .expect_err("start offset 4 is past 3 values");
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
    Ok(())
}

#[test]
fn invalid_page_values_are_usage_errors() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;

    for query in ["page=0", "page_size=lots"] {
        let url = format!("{}/v0/columns/main.symbol/values?{query}", server.base_url);
        let result = ureq::get(&url).call();
        let Err(ureq::Error::Status(status, response)) = result else {
            return Err(format!("expected status error for `{query}`").into());
        };
        assert_eq!(status, 400);
        let body: serde_json::Value = serde_json::from_str(&response.into_string()?)?;
        assert_eq!(body["error"]["kind"], "Usage");
    }
    Ok(())
}

#[test]
fn unknown_column_is_not_found_but_unknown_filter_is_ignored() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;
    let client = server.client()?;

    let err = client
        .values("main.absent", &page(1, 10), &[])
        .expect_err("column not in dataset");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let payload = client.values(
        "main.symbol",
        &page(1, 10),
        &[("not.a.column", "BRCA")],
    )?;
    assert_eq!(payload.count, 3);
    Ok(())
}

#[test]
fn columns_listing_includes_kinds_and_counts() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;
    let client = server.client()?;

    let columns = client.columns()?;
    let af_vcf = columns
        .iter()
        .find(|info| info.column == "main.af_vcf")
        .expect("af_vcf entry");
    assert_eq!(af_vcf.kind, Kind::Numeric);
    assert_eq!(af_vcf.values, Some(4));

    let dp = columns
        .iter()
        .find(|info| info.column == "main.dp")
        .expect("dp entry");
    assert_eq!(dp.values, None);
    Ok(())
}

#[test]
fn reload_swaps_dataset_and_failure_keeps_serving() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start(temp_dir.path())?;
    let client = server.client()?;

    std::fs::write(
        &server.data_path,
        r#"{"main.symbol": {"unique_values": ["EGFR"]}}"#,
    )?;
    let columns = client.reload()?;
    assert_eq!(columns, 1);
    let payload = client.values("main.symbol", &page(1, 10), &[])?;
    assert_eq!(payload.results, vec![Value::from("EGFR")]);

    std::fs::write(&server.data_path, "{broken")?;
    let err = client.reload().expect_err("broken dataset cannot reload");
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    // The previous snapshot keeps serving.
    let payload = client.values("main.symbol", &page(1, 10), &[])?;
    assert_eq!(payload.results, vec![Value::from("EGFR")]);
    Ok(())
}

#[test]
fn bearer_token_gates_every_endpoint() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start_with_token(temp_dir.path(), Some("sekrit"))?;

    let unauthenticated = RemoteClient::new(server.base_url.clone())?;
    let err = unauthenticated
        .values("main.symbol", &page(1, 10), &[])
        .expect_err("token is required");
    assert_eq!(err.kind(), ErrorKind::Permission);

    let err = unauthenticated.reload().expect_err("token is required");
    assert_eq!(err.kind(), ErrorKind::Permission);

    let authenticated = server.client()?;
    let payload = authenticated.values("main.symbol", &page(1, 10), &[])?;
    assert_eq!(payload.count, 3);
    Ok(())
}

#[test]
fn health_endpoint_is_open() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let server = TestServer::start_with_token(temp_dir.path(), Some("sekrit"))?;
    let unauthenticated = RemoteClient::new(server.base_url.clone())?;
    unauthenticated.health()?;
    Ok(())
}
