use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tb_core::domain::{DeltaStream, UpstreamError, UpstreamModel, UpstreamRequest};

type OpenFn = dyn Fn() -> Result<DeltaStream, UpstreamError> + Send + Sync;

/// Scripted upstream that records every request it is asked to open.
pub struct MockUpstream {
    open: Box<OpenFn>,
    calls: AtomicUsize,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl MockUpstream {
    pub fn new(open: impl Fn() -> Result<DeltaStream, UpstreamError> + Send + Sync + 'static) -> Self {
        Self {
            open: Box::new(open),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Streams the given fragments, then ends.
    pub fn with_deltas(deltas: &[&str]) -> Self {
        let deltas: Vec<String> = deltas.iter().map(|d| (*d).to_owned()).collect();
        Self::new(move || {
            let items: Vec<Result<String, UpstreamError>> =
                deltas.iter().cloned().map(Ok).collect();
            Ok(Box::pin(futures_util::stream::iter(items)) as DeltaStream)
        })
    }

    /// Fails to open with an HTTP status error.
    pub fn failing(status: u16) -> Self {
        Self::new(move || {
            Err(UpstreamError::HttpStatus {
                status,
                body: "upstream unavailable".to_owned(),
            })
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<UpstreamRequest> {
        self.requests.lock().ok()?.last().cloned()
    }
}

impl UpstreamModel for MockUpstream {
    fn open_stream<'a>(
        &'a self,
        request: &'a UpstreamRequest,
    ) -> Pin<Box<dyn Future<Output = Result<DeltaStream, UpstreamError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            (self.open)()
        })
    }
}

/// Sets a flag when dropped; placed inside a stream to observe its release.
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}
