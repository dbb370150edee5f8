use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::Instrument;

use tb_core::domain::{
    Catalog, ChatError, ConfigSelection, ConversationTurn, GradeLevelId, ModelId, RelayEvent,
    RequestId,
};

use crate::orchestrator::{ChatPipeline, RelayStream};

/// Ten megabyte attachments grow by a third once base64 encoded.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub const CHAT_FAILURE_MESSAGE: &str = "Failed to process chat request";

const DONE_SENTINEL: &str = "[DONE]";

// ---------------------------------------------------------------------------
// AppState: shared state for all handlers
// ---------------------------------------------------------------------------

pub struct AppState {
    pub pipeline: ChatPipeline,
    pub catalog: Catalog,
}

pub fn build_router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/catalog", get(handle_catalog))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequestWire {
    pub messages: Vec<ConversationTurn>,
    #[serde(default)]
    pub config: ChatConfigWire,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfigWire {
    pub model: Option<ProfileRef>,
    pub grade_level: Option<ProfileRef>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub enable_reasoning: Option<bool>,
}

/// A profile named either by its bare id or by a full profile object, of
/// which only the `id` is read.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ProfileRef {
    Id(String),
    Profile { id: String },
}

impl ProfileRef {
    pub fn id(&self) -> &str {
        match self {
            ProfileRef::Id(id) | ProfileRef::Profile { id } => id,
        }
    }
}

impl ChatConfigWire {
    pub fn into_selection(self) -> ConfigSelection {
        ConfigSelection {
            model: self.model.map(|m| ModelId::new(m.id())),
            grade_level: self.grade_level.map(|g| GradeLevelId::new(g.id())),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            enable_reasoning: self.enable_reasoning,
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/chat
// ---------------------------------------------------------------------------

pub async fn handle_chat(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request_id = RequestId::new(format!("req-{}", uuid::Uuid::new_v4()));
    let span = tracing::info_span!("chat", request_id = %request_id);

    match handle_chat_inner(&state, &body).instrument(span.clone()).await {
        Ok(stream) => Sse::new(sse_events(stream)).into_response(),
        Err(err) => {
            span.in_scope(|| {
                tracing::error!(kind = err.kind(), error = %err, "chat request failed");
            });
            chat_error_to_response()
        }
    }
}

async fn handle_chat_inner(state: &AppState, body: &[u8]) -> Result<RelayStream, ChatError> {
    let request: ChatRequestWire = serde_json::from_slice(body)
        .map_err(|e| ChatError::Validation(format!("malformed request body: {e}")))?;

    let config = state.catalog.resolve(request.config.into_selection())?;
    tracing::debug!(
        turns = request.messages.len(),
        model = %config.model.id,
        grade_level = %config.grade_level.id,
        "chat request accepted"
    );

    state.pipeline.handle(request.messages, config).await
}

/// Maps relay events onto SSE frames. Every stream ends with `[DONE]`,
/// including after an error frame.
pub fn sse_events(stream: RelayStream) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    async_stream::stream! {
        let mut stream = stream;
        while let Some(event) = stream.next().await {
            match event {
                RelayEvent::Delta(text) => {
                    let data = serde_json::json!({ "content": text }).to_string();
                    yield Ok(Event::default().data(data));
                }
                RelayEvent::Error(message) => {
                    let data = serde_json::json!({ "error": message }).to_string();
                    yield Ok(Event::default().data(data));
                    yield Ok(Event::default().data(DONE_SENTINEL));
                    break;
                }
                RelayEvent::Done => {
                    yield Ok(Event::default().data(DONE_SENTINEL));
                    break;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/catalog, GET /health
// ---------------------------------------------------------------------------

pub async fn handle_catalog(State(state): State<Arc<AppState>>) -> Response {
    axum::Json(state.catalog.clone()).into_response()
}

pub async fn health_handler() -> Response {
    axum::Json(serde_json::json!({ "status": "ok" })).into_response()
}

// ---------------------------------------------------------------------------
// Error → Response conversion
// ---------------------------------------------------------------------------

/// Pre-stream failures all look the same to the client; the detail stays in
/// the server log.
pub fn chat_error_to_response() -> Response {
    let body = serde_json::json!({ "error": CHAT_FAILURE_MESSAGE });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
}
