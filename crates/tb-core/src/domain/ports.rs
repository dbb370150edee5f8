use std::future::Future;
use std::pin::Pin;

use futures_core::Stream;

use crate::domain::{ChatError, GradeLevelProfile, UpstreamError, UpstreamRequest};

/// Incremental text fragments from the upstream model, in arrival order.
/// Dropping the stream releases the underlying connection.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, UpstreamError>> + Send>>;

// ---------------------------------------------------------------------------
// PromptStore: resolves a grade level to its instruction document
// ---------------------------------------------------------------------------

pub trait PromptStore: Send + Sync {
    /// Fails with [`ChatError::ResourceNotFound`] when the document is absent.
    fn load<'a>(
        &'a self,
        grade_level: &'a GradeLevelProfile,
    ) -> Pin<Box<dyn Future<Output = Result<String, ChatError>> + Send + 'a>>;
}

// ---------------------------------------------------------------------------
// UpstreamModel: hosted language model (object-safe async via Pin<Box>)
// ---------------------------------------------------------------------------

pub trait UpstreamModel: Send + Sync {
    fn open_stream<'a>(
        &'a self,
        request: &'a UpstreamRequest,
    ) -> Pin<Box<dyn Future<Output = Result<DeltaStream, UpstreamError>> + Send + 'a>>;
}
