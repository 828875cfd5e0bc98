use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use storage_api_http::{
    ClientOptions, DropOptions, Stage, StorageApiError, StorageClient, TimeoutPolicy,
};

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    body: String,
    delay: Duration,
}

impl MockResponse {
    fn json(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_owned(),
            delay: Duration::from_millis(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
struct Recorded {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: String,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    hits: Arc<AtomicUsize>,
}

async fn storage_handler(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .recorded
        .lock()
        .expect("recorded mutex must not be poisoned")
        .push(Recorded {
            method,
            uri: uri.to_string(),
            headers,
            body,
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":"no mock response available"}"#,
            )
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    (
        response.status,
        [("content-type", "application/json")],
        response.body,
    )
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn recorded(&self) -> Vec<Recorded> {
        self.recorded
            .lock()
            .expect("recorded mutex must not be poisoned")
            .clone()
    }

    fn options(&self) -> ClientOptions {
        ClientOptions {
            retry_backoff_ms: 1,
            retry_backoff_max_ms: 5,
            job_poll_interval_ms: 1,
            ..ClientOptions::new(self.base_url.clone(), "test-token")
        }
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        recorded: Arc::new(Mutex::new(Vec::new())),
        hits: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new()
        .fallback(storage_handler)
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        recorded: state.recorded,
        task,
    }
}

const BUCKETS_BODY: &str = r#"[
    {"id": "in.c-main", "name": "main", "stage": "in", "backend": "snowflake"},
    {"id": "out.c-report", "name": "report", "stage": "out", "description": "daily"}
]"#;

const BUCKET_BODY: &str = r#"{"id": "in.c-main", "name": "main", "stage": "in"}"#;

#[tokio::test]
async fn list_buckets_sends_token_and_decodes() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::OK, BUCKETS_BODY)]).await;
    let client = StorageClient::new(server.options()).expect("valid options");

    let buckets = client.list_buckets().await.expect("list must succeed");

    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].id, "in.c-main");
    assert_eq!(buckets[1].description.as_deref(), Some("daily"));

    let recorded = server.recorded();
    assert_eq!(recorded[0].method, Method::GET);
    assert_eq!(recorded[0].uri, "/v2/storage/buckets");
    assert_eq!(
        recorded[0]
            .headers
            .get("x-storageapi-token")
            .and_then(|value| value.to_str().ok()),
        Some("test-token")
    );
    assert!(recorded[0].headers.get("user-agent").is_some());
}

#[tokio::test]
async fn oauth_client_sends_bearer_header() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::OK, BUCKET_BODY)]).await;
    let options = server
        .options()
        .auth_method_str(Some("oauth"))
        .expect("oauth is valid");
    let client = StorageClient::new(options).expect("valid options");

    client.get_bucket("in.c-main").await.expect("get must succeed");

    let recorded = server.recorded();
    assert_eq!(
        recorded[0]
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok()),
        Some("Bearer test-token")
    );
    assert!(recorded[0].headers.get("x-storageapi-token").is_none());
}

#[tokio::test]
async fn create_bucket_posts_json_payload() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::CREATED, BUCKET_BODY)]).await;
    let client = StorageClient::new(server.options().run_id("run-42")).expect("valid options");

    let bucket = client
        .create_bucket("main", Stage::In, Some("landing"))
        .await
        .expect("create must succeed");
    assert_eq!(bucket.stage, "in");

    let recorded = server.recorded();
    assert_eq!(recorded[0].method, Method::POST);
    let payload: serde_json::Value =
        serde_json::from_str(&recorded[0].body).expect("payload must be json");
    assert_eq!(
        payload,
        serde_json::json!({"name": "main", "stage": "in", "description": "landing"})
    );
    assert_eq!(
        recorded[0]
            .headers
            .get("x-kbc-runid")
            .and_then(|value| value.to_str().ok()),
        Some("run-42")
    );
}

#[tokio::test]
async fn retries_on_retryable_http_status() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"boom"}"#),
        MockResponse::json(StatusCode::OK, BUCKET_BODY),
    ])
    .await;
    let client =
        StorageClient::new(server.options().backoff_max_tries(3)).expect("valid options");

    let bucket = client
        .get_bucket("in.c-main")
        .await
        .expect("request must succeed after retry");

    assert_eq!(bucket.name, "main");
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn retries_disabled_by_default() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::SERVICE_UNAVAILABLE, r#"{"error":"down"}"#),
        MockResponse::json(StatusCode::OK, BUCKET_BODY),
    ])
    .await;
    let client = StorageClient::new(server.options()).expect("valid options");

    let err = client
        .get_bucket("in.c-main")
        .await
        .expect_err("must fail on first attempt");

    assert_eq!(err.status(), Some(503));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn maintenance_fails_fast_when_retry_disabled() {
    let server = spawn_server(vec![
        MockResponse::json(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"error":"Maintenance","reason":"Planned upgrade"}"#,
        ),
        MockResponse::json(StatusCode::OK, BUCKET_BODY),
    ])
    .await;
    let client = StorageClient::new(
        server
            .options()
            .backoff_max_tries(5)
            .retry_on_maintenance(false),
    )
    .expect("valid options");

    let err = client.list_buckets().await.expect_err("must fail");

    match &err {
        StorageApiError::Maintenance { reason, .. } => assert_eq!(reason, "Planned upgrade"),
        other => panic!("expected maintenance error, got {other:?}"),
    }
    assert!(err.to_string().contains("Maintenance"));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn not_implemented_is_not_retried() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::NOT_IMPLEMENTED, r#"{"error":"not supported"}"#),
        MockResponse::json(StatusCode::OK, BUCKET_BODY),
    ])
    .await;
    let client =
        StorageClient::new(server.options().backoff_max_tries(5)).expect("valid options");

    let err = client.list_buckets().await.expect_err("must fail");

    assert!(matches!(err, StorageApiError::Http { status: 501, .. }));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn version_conflict_is_retried() {
    let server = spawn_server(vec![
        MockResponse::json(
            StatusCode::CONFLICT,
            r#"{"code":"storage.components.configurations.versionConflict"}"#,
        ),
        MockResponse::json(StatusCode::OK, BUCKET_BODY),
    ])
    .await;
    let client =
        StorageClient::new(server.options().backoff_max_tries(2)).expect("valid options");

    client
        .get_bucket("in.c-main")
        .await
        .expect("must succeed after conflict retry");
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn other_conflicts_surface_platform_code() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::CONFLICT,
        r#"{"error":"Bucket already exists","code":"storage.buckets.alreadyExists"}"#,
    )])
    .await;
    let client =
        StorageClient::new(server.options().backoff_max_tries(2)).expect("valid options");

    let err = client
        .create_bucket("main", Stage::In, None)
        .await
        .expect_err("must fail");

    assert_eq!(err.status(), Some(409));
    assert_eq!(err.code(), Some("storage.buckets.alreadyExists"));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn budget_caps_total_attempts() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"one"}"#),
        MockResponse::json(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"two"}"#),
        MockResponse::json(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"three"}"#),
        MockResponse::json(StatusCode::OK, BUCKET_BODY),
    ])
    .await;
    let client =
        StorageClient::new(server.options().backoff_max_tries(2)).expect("valid options");

    let err = client.get_bucket("in.c-main").await.expect_err("must fail");

    assert!(matches!(err, StorageApiError::Http { status: 500, .. }));
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn request_timeout_surfaces_transport_error() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::OK, BUCKET_BODY).with_delay(Duration::from_millis(300))
    ])
    .await;
    let client = StorageClient::new(ClientOptions {
        timeouts: TimeoutPolicy {
            default: Duration::from_millis(20),
            extended: Duration::from_millis(20),
        },
        ..server.options()
    })
    .expect("valid options");

    let err = client
        .get_bucket("in.c-main")
        .await
        .expect_err("request must time out");

    match err {
        StorageApiError::Transport { source, .. } => assert!(source.is_timeout()),
        other => panic!("expected transport timeout error, got {other:?}"),
    }
}

#[tokio::test]
async fn branch_client_routes_only_branch_aware_calls() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::CREATED, r#"{"id":"123456"}"#),
        MockResponse::json(StatusCode::OK, "[]"),
    ])
    .await;
    let client = StorageClient::branch_aware(server.options(), "123").expect("valid options");

    let id = client.generate_id().await.expect("generate id must succeed");
    let events = client
        .list_table_events("in.c-main.users", None)
        .await
        .expect("events must succeed");

    assert_eq!(id, "123456");
    assert!(events.is_empty());
    let recorded = server.recorded();
    assert_eq!(recorded[0].uri, "/v2/storage/tickets");
    assert_eq!(
        recorded[1].uri,
        "/v2/storage/branch/123/tables/in.c-main.users/events"
    );
}

#[tokio::test]
async fn delete_with_async_job_polls_until_success() {
    let server = spawn_server(vec![
        MockResponse::json(StatusCode::ACCEPTED, r#"{"id":31,"status":"waiting"}"#),
        MockResponse::json(StatusCode::OK, r#"{"id":31,"status":"processing"}"#),
        MockResponse::json(StatusCode::OK, r#"{"id":31,"status":"success"}"#),
    ])
    .await;
    let client = StorageClient::new(server.options()).expect("valid options");

    client
        .drop_bucket(
            "in.c-main",
            DropOptions {
                force: false,
                is_async: true,
            },
        )
        .await
        .expect("drop must succeed");

    let recorded = server.recorded();
    assert_eq!(recorded.len(), 3);
    assert_eq!(recorded[0].method, Method::DELETE);
    assert_eq!(recorded[0].uri, "/v2/storage/buckets/in.c-main?async=1");
    assert_eq!(recorded[2].uri, "/v2/storage/jobs/31");
}

#[tokio::test]
async fn application_error_in_ok_response_is_surfaced() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::OK,
        r#"{"status":"error","error":"Table in.c-main.users is locked","code":"storage.tables.locked"}"#,
    )])
    .await;
    let client = StorageClient::new(server.options()).expect("valid options");

    let err = client
        .get_table("in.c-main.users")
        .await
        .expect_err("must fail");

    match err {
        StorageApiError::Application { code, message, .. } => {
            assert_eq!(code.as_deref(), Some("storage.tables.locked"));
            assert!(message.contains("locked"));
        }
        other => panic!("expected application error, got {other:?}"),
    }
}

#[tokio::test]
async fn connection_refused_is_transport_error_after_retries() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind");
    let address = listener.local_addr().expect("must have local addr");
    drop(listener);

    let client = StorageClient::new(ClientOptions {
        backoff_max_tries: 2,
        retry_backoff_ms: 1,
        retry_backoff_max_ms: 2,
        ..ClientOptions::new(format!("http://{address}"), "test-token")
    })
    .expect("valid options");

    let err = client.list_buckets().await.expect_err("must fail");
    assert!(matches!(err, StorageApiError::Transport { .. }));
}
