use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use crate::models::config::CaptureConfig;
use crate::models::effective::EffectiveConfig;
use crate::models::error::CaptureError;
use crate::models::state::SessionEnd;
use crate::session::byte_stream::ByteStream;
use crate::session::capture_session::{CaptureSession, SessionOutcome};
use crate::traits::capture_backend::CaptureBackend;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::permission_handler::PermissionHandler;

/// Tunables for a [`CaptureNegotiator`].
#[derive(Debug, Clone)]
pub struct NegotiatorOptions {
    /// Ask the permission handler before opening a session (default: true).
    pub permission_check_enabled: bool,

    /// How long each effective-config query may take before its field is
    /// reported unknown (default: 5 s).
    pub query_timeout: Duration,
}

impl NegotiatorOptions {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.query_timeout.is_zero() {
            return Err(CaptureError::InvalidArgument(
                "query timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for NegotiatorOptions {
    fn default() -> Self {
        Self {
            permission_check_enabled: true,
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// The last granted config and the session opened for it, swapped as one value.
#[derive(Clone)]
struct ActiveSession {
    config: CaptureConfig,
    session: CaptureSession,
}

/// Single owner of capture negotiation state.
///
/// Decides whether a request can reuse the active backend session or must
/// replace it, gates new sessions on capture permission, and exposes the
/// effective configuration of whichever session is active.
///
/// ```text
/// request_stream(config)
///   → validate → permission → same config & active? ─yes→ same stream
///                                   │no
///                                   ↓
///                       backend.open → new CaptureSession → swap → tear down old
/// ```
pub struct CaptureNegotiator<B: CaptureBackend, P: PermissionHandler> {
    backend: Arc<B>,
    permissions: P,
    permission_check: AtomicBool,
    query_timeout: Duration,
    negotiation: Mutex<()>,
    active: watch::Sender<Option<ActiveSession>>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl<B: CaptureBackend, P: PermissionHandler> CaptureNegotiator<B, P> {
    pub fn new(backend: B, permissions: P) -> Self {
        Self::build(backend, permissions, NegotiatorOptions::default())
    }

    pub fn with_options(
        backend: B,
        permissions: P,
        options: NegotiatorOptions,
    ) -> Result<Self, CaptureError> {
        options.validate()?;
        Ok(Self::build(backend, permissions, options))
    }

    fn build(backend: B, permissions: P, options: NegotiatorOptions) -> Self {
        let (active, _) = watch::channel(None);
        Self {
            backend: Arc::new(backend),
            permissions,
            permission_check: AtomicBool::new(options.permission_check_enabled),
            query_timeout: options.query_timeout,
            negotiation: Mutex::new(()),
            active,
            delegate: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Turn the permission gate on or off. An already open session is unaffected.
    pub fn set_permission_check_enabled(&self, enabled: bool) {
        self.permission_check.store(enabled, Ordering::SeqCst);
    }

    pub fn permission_check_enabled(&self) -> bool {
        self.permission_check.load(Ordering::SeqCst)
    }

    /// Get a byte stream for `config`, opening a backend session if needed.
    ///
    /// Identical configs share the active session; a different config
    /// replaces it and the previous session's stream ends. Must be called
    /// from within a tokio runtime.
    pub async fn request_stream(&self, config: CaptureConfig) -> Result<ByteStream, CaptureError> {
        if let Err(error) = config.validate() {
            log::warn!("rejected capture request: {}", error);
            self.notify_error(&error);
            return Err(error);
        }

        let result = self.negotiate(config).await;
        if let Err(ref error) = result {
            self.notify_error(error);
        }
        result
    }

    async fn negotiate(&self, config: CaptureConfig) -> Result<ByteStream, CaptureError> {
        let _negotiation = self.negotiation.lock().await;

        if self.permission_check_enabled() {
            self.authorize().await?;
        }

        if let Some(stream) = self.reuse(&config) {
            log::debug!("reusing capture session {} for {:?}", stream.session_id(), config);
            return Ok(stream);
        }

        log::info!("opening capture session for {:?}", config);
        let source = self
            .backend
            .open(config.open_request())
            .await
            .map_err(|error| match error {
                CaptureError::BackendUnavailable(_) => error,
                other => CaptureError::BackendUnavailable(other.to_string()),
            })?;

        let backend: Arc<dyn CaptureBackend> = self.backend.clone();
        let (session, stream) = CaptureSession::start(
            config,
            source,
            backend,
            self.query_timeout,
            self.delegate.clone(),
        );
        let metadata = session.metadata();

        let previous = self.active.send_replace(Some(ActiveSession { config, session }));
        if let Some(previous) = previous {
            previous.session.teardown(SessionEnd::Superseded);
        }

        log::info!("capture session {} opened", metadata.id);
        if let Some(ref delegate) = self.delegate {
            delegate.on_session_opened(&metadata);
        }
        Ok(stream)
    }

    async fn authorize(&self) -> Result<(), CaptureError> {
        let status = self.permissions.request_capture_permission().await;
        if status.is_granted() {
            return Ok(());
        }
        log::warn!("capture permission refused: {:?}", status);
        Err(CaptureError::PermissionDenied)
    }

    fn reuse(&self, config: &CaptureConfig) -> Option<ByteStream> {
        let active = self.active.borrow();
        let active = active.as_ref()?;
        if active.config == *config && active.session.is_active() {
            Some(active.session.bytes())
        } else {
            None
        }
    }

    /// The active session, if any.
    pub fn current_session(&self) -> Option<CaptureSession> {
        self.active.borrow().as_ref().map(|a| a.session.clone())
    }

    /// The config of the last session this negotiator opened and still holds.
    pub fn last_granted_config(&self) -> Option<CaptureConfig> {
        self.active.borrow().as_ref().map(|a| a.config)
    }

    /// Wait for the effective configuration of the active session.
    ///
    /// Waits for a first session if none was requested yet. If the session
    /// being waited on is replaced, waiting continues on its replacement.
    /// Fails with `Cancelled` when the session is closed or the negotiator
    /// is dropped.
    pub async fn effective_config(&self) -> Result<EffectiveConfig, CaptureError> {
        let mut slot = self.active.subscribe();
        let mut waiter = {
            let active = slot
                .wait_for(Option::is_some)
                .await
                .map_err(|_| CaptureError::Cancelled)?;
            match active.as_ref() {
                Some(a) => a.session.outcome_waiter(),
                None => return Err(CaptureError::Cancelled),
            }
        };

        loop {
            match waiter.wait().await {
                Some(SessionOutcome::Resolved(effective)) => return Ok(effective),
                Some(SessionOutcome::TornDown(SessionEnd::Superseded)) => {
                    // The replacement is swapped in before the old session is torn down.
                    waiter = match slot.borrow_and_update().as_ref() {
                        Some(a) => a.session.outcome_waiter(),
                        None => return Err(CaptureError::Cancelled),
                    };
                }
                _ => return Err(CaptureError::Cancelled),
            }
        }
    }

    pub async fn effective_sample_rate(&self) -> Result<Option<u32>, CaptureError> {
        Ok(self.effective_config().await?.sample_rate)
    }

    pub async fn effective_bit_depth(&self) -> Result<Option<u32>, CaptureError> {
        Ok(self.effective_config().await?.bit_depth)
    }

    pub async fn effective_buffer_size(&self) -> Result<Option<u32>, CaptureError> {
        Ok(self.effective_config().await?.buffer_size)
    }

    /// Tear down the active session. Returns whether there was one.
    ///
    /// Pending effective-config waiters fail with `Cancelled`.
    pub fn close(&self) -> bool {
        match self.active.send_replace(None) {
            Some(previous) => {
                previous.session.teardown(SessionEnd::Closed);
                true
            }
            None => false,
        }
    }

    fn notify_error(&self, error: &CaptureError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }
}

impl<B: CaptureBackend, P: PermissionHandler> Drop for CaptureNegotiator<B, P> {
    fn drop(&mut self) {
        self.close();
    }
}
