//! Fakes shared by this crate's tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

use crate::models::config::OpenRequest;
use crate::models::effective::EffectiveConfig;
use crate::models::error::CaptureError;
use crate::models::metadata::{SessionId, SessionMetadata};
use crate::models::state::SessionEnd;
use crate::traits::capture_backend::{BackendStream, CaptureBackend};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::permission_handler::{PermissionHandler, PermissionStatus};

type Feed = mpsc::UnboundedSender<Result<Bytes, CaptureError>>;

/// Backend whose chunks are pushed by the test.
///
/// Every `open` creates a new feed; `push` and friends write to the latest.
pub struct FakeBackend {
    requests: Mutex<Vec<OpenRequest>>,
    feeds: Mutex<Vec<Option<Feed>>>,
    fail_open: AtomicBool,
    hang_bit_depth: AtomicBool,
    queries: Mutex<(
        Result<f64, CaptureError>,
        Result<u32, CaptureError>,
        Result<u32, CaptureError>,
    )>,
    query_count: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            feeds: Mutex::new(Vec::new()),
            fail_open: AtomicBool::new(false),
            hang_bit_depth: AtomicBool::new(false),
            queries: Mutex::new((Ok(16_000.0), Ok(8), Ok(1024))),
            query_count: AtomicUsize::new(0),
        }
    }

    pub fn set_queries(
        &self,
        sample_rate: Result<f64, CaptureError>,
        bit_depth: Result<u32, CaptureError>,
        buffer_size: Result<u32, CaptureError>,
    ) {
        *self.queries.lock() = (sample_rate, bit_depth, buffer_size);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make `bit_depth` queries never answer.
    pub fn hang_bit_depth(&self) {
        self.hang_bit_depth.store(true, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<OpenRequest> {
        self.requests.lock().last().copied()
    }

    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    /// Send a chunk on the most recently opened session.
    pub fn push(&self, data: &[u8]) {
        self.send(Ok(Bytes::copy_from_slice(data)));
    }

    pub fn push_error(&self, error: CaptureError) {
        self.send(Err(error));
    }

    /// End the most recently opened session from the backend side.
    pub fn end(&self) {
        if let Some(slot) = self.feeds.lock().last_mut() {
            slot.take();
        }
    }

    /// Whether the consumer of the `index`-th opened session has let go of it.
    pub fn feed_closed(&self, index: usize) -> bool {
        match self.feeds.lock().get(index) {
            Some(Some(feed)) => feed.is_closed(),
            _ => true,
        }
    }

    fn send(&self, item: Result<Bytes, CaptureError>) {
        if let Some(Some(feed)) = self.feeds.lock().last() {
            let _ = feed.send(item);
        }
    }
}

#[async_trait]
impl CaptureBackend for FakeBackend {
    async fn open(&self, request: OpenRequest) -> Result<BackendStream, CaptureError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(CaptureError::backend("fake open failure"));
        }
        self.requests.lock().push(request);

        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().push(Some(tx));
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }

    async fn sample_rate(&self) -> Result<f64, CaptureError> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().0.clone()
    }

    async fn bit_depth(&self) -> Result<u32, CaptureError> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        if self.hang_bit_depth.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.queries.lock().1.clone()
    }

    async fn buffer_size(&self) -> Result<u32, CaptureError> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().2.clone()
    }
}

/// Permission handler that answers with a fixed status and counts requests.
pub struct FakePermissions {
    status: Mutex<PermissionStatus>,
    calls: AtomicUsize,
}

impl FakePermissions {
    pub fn new(status: PermissionStatus) -> Self {
        Self {
            status: Mutex::new(status),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionHandler for FakePermissions {
    async fn request_capture_permission(&self) -> PermissionStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.status.lock()
    }
}

/// Permission handler that holds every request until `open` is called.
#[derive(Default)]
pub struct GatedPermissions {
    open: AtomicBool,
    gate: Notify,
    calls: AtomicUsize,
}

impl GatedPermissions {
    /// Grant pending and future requests.
    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionHandler for GatedPermissions {
    async fn request_capture_permission(&self) -> PermissionStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let opened = self.gate.notified();
        if !self.open.load(Ordering::SeqCst) {
            opened.await;
        }
        PermissionStatus::Granted
    }
}

/// Delegate that records every callback as a short string.
#[derive(Default)]
pub struct RecordingDelegate {
    events: Mutex<Vec<String>>,
}

impl RecordingDelegate {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl CaptureDelegate for RecordingDelegate {
    fn on_session_opened(&self, metadata: &SessionMetadata) {
        self.events
            .lock()
            .push(format!("opened {}", metadata.requested.sample_rate));
    }

    fn on_effective_config(&self, _session: SessionId, effective: &EffectiveConfig) {
        self.events
            .lock()
            .push(format!("effective {:?}", effective.sample_rate));
    }

    fn on_session_ended(&self, _session: SessionId, reason: &SessionEnd) {
        self.events.lock().push(format!("ended {:?}", reason));
    }

    fn on_error(&self, error: &CaptureError) {
        self.events.lock().push(format!("error {}", error));
    }
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
