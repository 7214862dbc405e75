use crate::models::effective::EffectiveConfig;
use crate::models::error::CaptureError;
use crate::models::metadata::{SessionId, SessionMetadata};
use crate::models::state::SessionEnd;

/// Event delegate for negotiator and session notifications.
///
/// Methods are called from the negotiating task or from a session's
/// background tasks, never while negotiation state is locked.
/// Implementations should hand off anything slow.
pub trait CaptureDelegate: Send + Sync {
    /// A new backend session was opened and became the active one.
    fn on_session_opened(&self, metadata: &SessionMetadata);

    /// The session's effective configuration was resolved.
    fn on_effective_config(&self, session: SessionId, effective: &EffectiveConfig);

    /// The session stopped, either torn down or ended by the backend.
    fn on_session_ended(&self, session: SessionId, reason: &SessionEnd);

    /// A request or a live stream failed.
    fn on_error(&self, error: &CaptureError);
}
