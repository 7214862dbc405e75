use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::models::config::CaptureConfig;
use crate::models::effective::EffectiveConfig;
use crate::models::error::CaptureError;
use crate::models::metadata::{SessionId, SessionMetadata};
use crate::models::state::SessionEnd;
use crate::session::byte_stream::{ByteStream, Fanout, StreamEvent};
use crate::sync::resolution::{Resolution, Waiter};
use crate::traits::capture_backend::{BackendStream, CaptureBackend};
use crate::traits::capture_delegate::CaptureDelegate;

/// How a session's effective-config slot was settled.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionOutcome {
    Resolved(EffectiveConfig),
    TornDown(SessionEnd),
}

/// Background tasks of a session. `None` once the session is torn down.
type TaskSlot = Arc<Mutex<Option<Vec<JoinHandle<()>>>>>;

struct SessionInner {
    id: SessionId,
    opened_at: DateTime<Utc>,
    requested: CaptureConfig,
    outcome: Arc<Resolution<SessionOutcome>>,
    active: Arc<AtomicBool>,
    fanout: Fanout,
    tasks: TaskSlot,
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.fanout.close();
        if let Some(handles) = self.tasks.lock().take() {
            for handle in handles {
                handle.abort();
            }
        }
    }
}

/// One open backend session: its byte stream and its effective configuration.
///
/// Cheap to clone; clones share the same session. Sessions are created and
/// torn down only by the `CaptureNegotiator`.
#[derive(Clone)]
pub struct CaptureSession {
    inner: Arc<SessionInner>,
}

impl CaptureSession {
    /// Start pumping `source` and return the session with its first subscriber.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn start(
        requested: CaptureConfig,
        source: BackendStream,
        backend: Arc<dyn CaptureBackend>,
        query_timeout: Duration,
        delegate: Option<Arc<dyn CaptureDelegate>>,
    ) -> (Self, ByteStream) {
        let id = SessionId::new();
        let fanout = Fanout::new();
        let stream = fanout.subscribe(id);

        let outcome = Arc::new(Resolution::new());
        let active = Arc::new(AtomicBool::new(true));
        let tasks: TaskSlot = Arc::new(Mutex::new(Some(Vec::with_capacity(2))));

        let pump = Pump {
            id,
            backend,
            query_timeout,
            fanout: fanout.clone(),
            outcome: Arc::clone(&outcome),
            active: Arc::clone(&active),
            tasks: Arc::clone(&tasks),
            delegate: delegate.clone(),
        };
        let handle = tokio::spawn(pump.run(source));
        push_task(&tasks, handle);

        let session = Self {
            inner: Arc::new(SessionInner {
                id,
                opened_at: Utc::now(),
                requested,
                outcome,
                active,
                fanout,
                tasks,
                delegate,
            }),
        };
        (session, stream)
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.inner.opened_at
    }

    /// Configuration this session was opened with.
    pub fn requested(&self) -> CaptureConfig {
        self.inner.requested
    }

    /// Whether the backend is still streaming and the session was not torn down.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// A new subscription to the live stream, starting at its current position.
    pub fn bytes(&self) -> ByteStream {
        self.inner.fanout.subscribe(self.inner.id)
    }

    /// Wait for the effective configuration.
    ///
    /// Resolves once per session; later calls return the same value at once.
    /// Fails with `Cancelled` if the session is torn down first.
    pub async fn effective_config(&self) -> Result<EffectiveConfig, CaptureError> {
        match self.outcome_waiter().wait().await {
            Some(SessionOutcome::Resolved(effective)) => Ok(effective),
            _ => Err(CaptureError::Cancelled),
        }
    }

    /// The effective configuration if it is already known.
    pub fn try_effective_config(&self) -> Option<EffectiveConfig> {
        match self.inner.outcome.peek() {
            Some(SessionOutcome::Resolved(effective)) => Some(effective),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.try_effective_config().is_some()
    }

    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            id: self.inner.id,
            opened_at: self.inner.opened_at,
            requested: self.inner.requested,
            effective: self.try_effective_config(),
        }
    }

    pub(crate) fn outcome_waiter(&self) -> Waiter<SessionOutcome> {
        self.inner.outcome.waiter()
    }

    /// Stop the session: settle pending waiters with `reason` and stop the pump.
    ///
    /// Dropping the pump releases the backend stream. Every subscriber ends
    /// once it has read the chunks already queued for it.
    pub(crate) fn teardown(&self, reason: SessionEnd) {
        let Some(handles) = self.inner.tasks.lock().take() else {
            return;
        };

        if self
            .inner
            .outcome
            .resolve(SessionOutcome::TornDown(reason.clone()))
        {
            log::debug!(
                "session {} torn down before its effective config resolved",
                self.inner.id
            );
        }
        self.inner.fanout.close();
        for handle in handles {
            handle.abort();
        }

        if self.inner.active.swap(false, Ordering::SeqCst) {
            log::info!("capture session {} stopped: {:?}", self.inner.id, reason);
            if let Some(ref delegate) = self.inner.delegate {
                delegate.on_session_ended(self.inner.id, &reason);
            }
        }
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.inner.id)
            .field("requested", &self.inner.requested)
            .field("active", &self.is_active())
            .field("effective", &self.try_effective_config())
            .finish()
    }
}

fn push_task(tasks: &Mutex<Option<Vec<JoinHandle<()>>>>, handle: JoinHandle<()>) {
    match tasks.lock().as_mut() {
        Some(handles) => handles.push(handle),
        // Torn down while the task was being spawned.
        None => handle.abort(),
    }
}

/// Forwards backend chunks to subscribers and arms the one-shot resolver.
///
/// Holds no reference to the session itself, so dropping the last session
/// handle aborts it.
struct Pump {
    id: SessionId,
    backend: Arc<dyn CaptureBackend>,
    query_timeout: Duration,
    fanout: Fanout,
    outcome: Arc<Resolution<SessionOutcome>>,
    active: Arc<AtomicBool>,
    tasks: TaskSlot,
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl Pump {
    async fn run(self, mut source: BackendStream) {
        let mut seen_chunk = false;

        let end = loop {
            match source.next().await {
                Some(Ok(chunk)) => {
                    let len = chunk.len();
                    // No subscriber is not an error; the session stays open.
                    self.fanout.publish(StreamEvent::Chunk(chunk));
                    if !seen_chunk {
                        seen_chunk = true;
                        log::debug!("session {} received first chunk ({} bytes)", self.id, len);
                        self.spawn_resolver();
                    }
                }
                Some(Err(error)) => {
                    log::error!("capture session {} failed: {}", self.id, error);
                    if let Some(ref delegate) = self.delegate {
                        delegate.on_error(&error);
                    }
                    let reason = SessionEnd::Failed(error.to_string());
                    self.fanout.publish(StreamEvent::Failed(error));
                    break reason;
                }
                None => break SessionEnd::Ended,
            }
        };
        self.fanout.close();

        if !seen_chunk
            && self
                .outcome
                .resolve(SessionOutcome::Resolved(EffectiveConfig::unknown()))
        {
            log::warn!(
                "session {} ended before any data, effective config unknown",
                self.id
            );
            if let Some(ref delegate) = self.delegate {
                delegate.on_effective_config(self.id, &EffectiveConfig::unknown());
            }
        }

        if self.active.swap(false, Ordering::SeqCst) {
            log::info!("capture session {} stopped: {:?}", self.id, end);
            if let Some(ref delegate) = self.delegate {
                delegate.on_session_ended(self.id, &end);
            }
        }
    }

    fn spawn_resolver(&self) {
        let id = self.id;
        let backend = Arc::clone(&self.backend);
        let outcome = Arc::clone(&self.outcome);
        let delegate = self.delegate.clone();
        let limit = self.query_timeout;

        let handle = tokio::spawn(async move {
            let effective = query_effective(backend.as_ref(), id, limit).await;
            if outcome.resolve(SessionOutcome::Resolved(effective)) {
                log::info!("session {} effective config: {:?}", id, effective);
                if let Some(ref delegate) = delegate {
                    delegate.on_effective_config(id, &effective);
                }
            }
        });
        push_task(&self.tasks, handle);
    }
}

/// Ask the backend what it actually granted.
///
/// The three queries run concurrently and fail independently. A query that
/// fails or outlasts `limit` leaves its field unknown.
async fn query_effective(
    backend: &dyn CaptureBackend,
    id: SessionId,
    limit: Duration,
) -> EffectiveConfig {
    let (sample_rate, bit_depth, buffer_size) = tokio::join!(
        reported(id, "sample rate", limit, backend.sample_rate()),
        reported(id, "bit depth", limit, backend.bit_depth()),
        reported(id, "buffer size", limit, backend.buffer_size())
    );

    EffectiveConfig {
        sample_rate: sample_rate.and_then(EffectiveConfig::rate_from_backend),
        bit_depth,
        buffer_size,
    }
}

async fn reported<T>(
    id: SessionId,
    what: &str,
    limit: Duration,
    query: impl std::future::Future<Output = Result<T, CaptureError>>,
) -> Option<T> {
    match tokio::time::timeout(limit, query).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(error)) => {
            log::warn!("session {}: {} query failed: {}", id, what, error);
            None
        }
        Err(_) => {
            log::warn!("session {}: {} query timed out after {:?}", id, what, limit);
            None
        }
    }
}
