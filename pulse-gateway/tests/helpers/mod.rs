//! Shared test helpers
//!
//! Runs an in-process stand-in for the event logger (and the coaching API)
//! on an ephemeral port, then builds the real router against it.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use pulse_common::config::{CoachConfig, GatewayConfig, LoggingConfig};
use pulse_gateway::{build_router, AppState};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_TOKEN: &str = "test-token";
pub const COACH_REPLY: &str = "Nice and steady. Keep breathing slowly.";

#[derive(Default)]
struct MockState {
    /// Every accepted POST /api/event body, in arrival order
    posted: Vec<Value>,
    /// Bearer tokens seen on POST /api/event
    tokens: Vec<String>,
    /// `data.timestamp` values answered with 500
    fail_timestamps: HashSet<String>,
    /// Body served from GET /api/events
    stored: Vec<Value>,
    /// Every chat-completions request body
    chat_requests: Vec<Value>,
}

/// Handle to the running mock services
#[derive(Clone)]
pub struct MockServices {
    pub base_url: String,
    state: Arc<Mutex<MockState>>,
}

impl MockServices {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(MockState::default()));

        let app = Router::new()
            .route("/api/event", post(mock_post_event))
            .route("/api/events", get(mock_get_events))
            .route("/chat/completions", post(mock_chat))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock listener");
        let addr = listener.local_addr().expect("mock address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn fail_timestamp(&self, timestamp: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_timestamps
            .insert(timestamp.to_string());
    }

    pub fn set_stored_events(&self, events: Vec<Value>) {
        self.state.lock().unwrap().stored = events;
    }

    pub fn posted(&self) -> Vec<Value> {
        self.state.lock().unwrap().posted.clone()
    }

    pub fn posted_timestamps(&self) -> Vec<String> {
        self.posted()
            .iter()
            .map(|p| p["data"]["timestamp"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().tokens.clone()
    }

    pub fn chat_requests(&self) -> Vec<Value> {
        self.state.lock().unwrap().chat_requests.clone()
    }
}

async fn mock_post_event(
    State(state): State<Arc<Mutex<MockState>>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string();
    state.tokens.push(token);

    let timestamp = body["data"]["timestamp"].as_str().unwrap_or_default();
    if state.fail_timestamps.contains(timestamp) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    state.posted.push(body);
    StatusCode::CREATED
}

async fn mock_get_events(State(state): State<Arc<Mutex<MockState>>>) -> Json<Value> {
    Json(Value::Array(state.lock().unwrap().stored.clone()))
}

async fn mock_chat(
    State(state): State<Arc<Mutex<MockState>>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.lock().unwrap().chat_requests.push(body);
    Json(json!({
        "choices": [
            { "message": { "role": "assistant", "content": COACH_REPLY } }
        ]
    }))
}

/// Gateway config pointing at `logger_url`, coaching disabled
pub fn test_config(logger_url: &str) -> GatewayConfig {
    GatewayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        event_logger_url: logger_url.to_string(),
        event_logger_token: TEST_TOKEN.to_string(),
        request_timeout: Duration::from_secs(5),
        forward_concurrency: 1,
        max_upload_bytes: 1024 * 1024,
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        coach: CoachConfig {
            api_key: None,
            base_url: logger_url.to_string(),
            model: "test-model".to_string(),
        },
    }
}

pub fn setup_app(config: GatewayConfig) -> Router {
    let state = AppState::new(config).expect("Should build app state");
    build_router(state)
}

/// Mock services plus a router wired to them
pub async fn setup() -> (MockServices, Router) {
    let mocks = MockServices::start().await;
    let app = setup_app(test_config(&mocks.base_url));
    (mocks, app)
}

pub const BOUNDARY: &str = "----pulse-test-boundary";

/// multipart/form-data request with a single `file` part
pub fn multipart_upload(uri: &str, filename: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
         Content-Type: application/octet-stream\r\n\
         \r\n\
         {c}\r\n\
         --{b}--\r\n",
        b = BOUNDARY,
        f = filename,
        c = content
    );

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
