use thiserror::Error;

/// Errors that can occur while negotiating or consuming a capture stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The request was malformed, e.g. a sample rate outside 1..=100000.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Capture authorization was refused, temporarily or permanently.
    #[error("permission denied")]
    PermissionDenied,

    /// The backend could not open a session or failed while streaming.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The session was torn down while a caller was waiting on it.
    #[error("cancelled")]
    Cancelled,
}

impl CaptureError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::BackendUnavailable(message.into())
    }
}
