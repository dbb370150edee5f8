use std::sync::Arc;
use std::time::Duration;

use futures_core::Stream;
use futures_util::StreamExt;
use tb_core::domain::{RelayEvent, UpstreamError, UpstreamModel, UpstreamRequest};

/// The only error text a client ever sees for a failed stream.
pub const STREAM_ERROR_MESSAGE: &str = "An error occurred while streaming the response";

// ---------------------------------------------------------------------------
// Streaming relay
// ---------------------------------------------------------------------------

/// Opens one upstream completion and forwards its fragments as relay events.
///
/// The stream ends with exactly one terminal event: `Done` on normal
/// completion, `Error` on any failure. The upstream stream lives inside the
/// generator, so dropping the returned stream (client disconnect) releases
/// the upstream connection too.
pub fn relay(
    upstream: Arc<dyn UpstreamModel>,
    request: UpstreamRequest,
    idle_timeout: Duration,
) -> impl Stream<Item = RelayEvent> + Send + 'static {
    async_stream::stream! {
        let opened = upstream.open_stream(&request).await;
        let mut deltas = match opened {
            Ok(s) => Some(s),
            Err(err) => {
                log_failure(&request, &err, 0);
                yield RelayEvent::Error(STREAM_ERROR_MESSAGE.to_owned());
                None
            }
        };

        let mut fragments: usize = 0;
        while let Some(stream) = deltas.as_mut() {
            match tokio::time::timeout(idle_timeout, stream.next()).await {
                Ok(Some(Ok(text))) => {
                    if text.is_empty() {
                        continue;
                    }
                    fragments += 1;
                    yield RelayEvent::Delta(text);
                }
                Ok(Some(Err(err))) => {
                    log_failure(&request, &err, fragments);
                    yield RelayEvent::Error(STREAM_ERROR_MESSAGE.to_owned());
                    break;
                }
                Ok(None) => {
                    tracing::debug!(model = %request.model, fragments, "upstream stream completed");
                    yield RelayEvent::Done;
                    break;
                }
                Err(_) => {
                    let err = UpstreamError::Timeout {
                        timeout_ms: idle_timeout.as_millis() as u64,
                    };
                    log_failure(&request, &err, fragments);
                    yield RelayEvent::Error(STREAM_ERROR_MESSAGE.to_owned());
                    break;
                }
            }
        }
    }
}

fn log_failure(request: &UpstreamRequest, err: &UpstreamError, fragments: usize) {
    tracing::error!(
        error = %err,
        model = %request.model,
        fragments,
        "upstream stream failed"
    );
}
