use crate::domain::GradeLevelId;

// ---------------------------------------------------------------------------
// Sub-error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("upstream connection failed: {0}")]
    Connection(String),
    #[error("upstream timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("failed to decode upstream chunk: {0}")]
    Decode(String),
    #[error("upstream provider error: {0}")]
    Provider(String),
    #[error("failed to encode upstream request: {0}")]
    Encode(String),
}

// ---------------------------------------------------------------------------
// Top-level error: anything that aborts a chat request before streaming
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid chat request: {0}")]
    Validation(String),
    #[error("prompt resource {key} for grade level {grade_level} not found")]
    ResourceNotFound {
        grade_level: GradeLevelId,
        key: String,
    },
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ChatError {
    /// Short machine-readable label used in server-side logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Validation(_) => "validation_error",
            ChatError::ResourceNotFound { .. } => "resource_not_found",
            ChatError::Upstream(_) => "upstream_error",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
