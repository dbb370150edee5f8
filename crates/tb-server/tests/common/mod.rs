#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;

use tb_server::config::{AppConfig, ServerConfig, UpstreamConfig};

// ---------------------------------------------------------------------------
// MockUpstreamServer: configurable mock of an OpenAI-style streaming API
// ---------------------------------------------------------------------------

struct MockConfig {
    response_body: String,
    status_code: u16,
    delay_ms: u64,
    captured: Mutex<Vec<CapturedRequest>>,
}

#[derive(Clone, Debug)]
pub struct CapturedRequest {
    pub body: serde_json::Value,
    pub authorization: Option<String>,
    pub referer: Option<String>,
    pub title: Option<String>,
}

pub struct MockUpstreamServer {
    addr: SocketAddr,
    config: Arc<MockConfig>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockUpstreamServer {
    /// Serves the given `data:` payloads as one SSE body.
    pub async fn start_sse(payloads: &[String]) -> Self {
        let body: String = payloads
            .iter()
            .map(|p| format!("data: {p}\n\n"))
            .collect();
        Self::start_with_options(&body, 200, 0).await
    }

    pub async fn start_with_options(response_body: &str, status: u16, delay_ms: u64) -> Self {
        let config = Arc::new(MockConfig {
            response_body: response_body.to_owned(),
            status_code: status,
            delay_ms,
            captured: Mutex::new(Vec::new()),
        });

        let app = axum::Router::new()
            .route("/api/v1/chat/completions", post(mock_completion_handler))
            .with_state(config.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            config,
            _handle: handle,
        }
    }

    /// Base URL in the same shape as the hosted API (`.../api/v1`).
    pub fn url(&self) -> String {
        format!("http://{}/api/v1", self.addr)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.config.captured.lock().unwrap().clone()
    }
}

impl Drop for MockUpstreamServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

async fn mock_completion_handler(
    State(config): State<Arc<MockConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    config.captured.lock().unwrap().push(CapturedRequest {
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
        authorization: header("authorization"),
        referer: header("http-referer"),
        title: header("x-title"),
    });

    if config.delay_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(config.delay_ms)).await;
    }

    let status =
        StatusCode::from_u16(config.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (
        status,
        [(axum::http::header::CONTENT_TYPE, "text/event-stream")],
        config.response_body.clone(),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// TestServer: a real tutor-bridge server wired to a mock upstream
// ---------------------------------------------------------------------------

pub struct TestServer {
    pub addr: SocketAddr,
    _prompts: tempfile::TempDir,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start(upstream_url: &str) -> Self {
        Self::start_with(upstream_url, |_| {}).await
    }

    /// Starts a server after letting the caller adjust the default config.
    pub async fn start_with(upstream_url: &str, adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let prompts = tempfile::tempdir().expect("create prompts dir");
        for (file, text) in [
            ("elementary_1-5.md", ELEMENTARY_PROMPT),
            ("middle_6-8.md", MIDDLE_PROMPT),
            ("high_9-12.md", HIGH_PROMPT),
        ] {
            std::fs::write(prompts.path().join(file), text).expect("write prompt");
        }

        let mut config = AppConfig {
            server: ServerConfig {
                listen: "127.0.0.1:0".to_owned(),
            },
            upstream: UpstreamConfig {
                base_url: upstream_url.to_owned(),
                api_key: Some(TEST_API_KEY.to_owned()),
                request_timeout_ms: 5_000,
                idle_timeout_ms: 2_000,
                ..UpstreamConfig::default()
            },
            ..AppConfig::default()
        };
        config.prompts.dir = prompts.path().to_path_buf();
        adjust(&mut config);

        let runtime = tb_server::bootstrap::into_runtime_with_key(config, None)
            .expect("test config should be valid");
        let state = tb_server::bootstrap::build_app_state(runtime).expect("build app state");
        let app = tb_server::handler::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind server");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            _prompts: prompts,
            _handle: handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn post_chat(&self, body: String) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/api/chat", self.url()))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .expect("request should succeed")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

pub const TEST_API_KEY: &str = "sk-or-test-0000000000000000";
pub const TEST_MODEL: &str = "openai/gpt-4o";
pub const REASONING_MODEL: &str = "anthropic/claude-sonnet-4";

pub const ELEMENTARY_PROMPT: &str = "You are a patient tutor for students in grades 1 to 5.";
pub const MIDDLE_PROMPT: &str = "You are a tutor for students in grades 6 to 8.";
pub const HIGH_PROMPT: &str = "You are a tutor for students in grades 9 to 12.";

/// One OpenAI-style streaming chunk carrying `content`.
pub fn delta_chunk(content: &str) -> String {
    serde_json::json!({
        "id": "gen-test",
        "object": "chat.completion.chunk",
        "choices": [{
            "index": 0,
            "delta": {"role": "assistant", "content": content},
            "finish_reason": null
        }]
    })
    .to_string()
}

pub fn sample_sse_chunks() -> Vec<String> {
    vec![
        delta_chunk("Fractions "),
        delta_chunk("are parts "),
        delta_chunk("of a whole."),
        serde_json::json!({
            "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]
        })
        .to_string(),
        "[DONE]".to_owned(),
    ]
}

pub fn chat_body(text: &str, model: &str, grade_level: &str) -> String {
    serde_json::json!({
        "messages": [
            {"id": "1", "role": "user", "content": text, "timestamp": "2025-03-01T12:00:00.000Z"}
        ],
        "config": {
            "model": {"id": model, "name": "Test Model", "provider": "Test"},
            "gradeLevel": {"id": grade_level, "name": "Elementary School", "range": "1st - 5th Grade"},
            "temperature": 0.7,
            "maxTokens": 2000,
            "enableReasoning": true
        }
    })
    .to_string()
}

/// Payloads of every `data:` line in an SSE body.
pub fn data_lines(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|l| l.strip_prefix("data: "))
        .map(str::to_owned)
        .collect()
}
