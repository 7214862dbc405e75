//! # mic-stream-core
//!
//! Platform-agnostic microphone stream core.
//!
//! Negotiates a capture configuration with a backend, reuses the backend
//! session while the configuration is unchanged, and exposes one live byte
//! stream whose effective configuration (what the backend actually granted)
//! resolves once the first chunk of audio arrives.
//! Platform backends implement the `CaptureBackend` trait and plug into the
//! generic `CaptureNegotiator`.
//!
//! ## Architecture
//!
//! ```text
//! mic-stream-core (this crate)
//! ├── traits/       ← CaptureBackend, PermissionHandler, CaptureDelegate
//! ├── models/       ← CaptureConfig, EffectiveConfig, CaptureError, SessionEnd, metadata
//! ├── sync/         ← Resolution (single-fire value with many waiters)
//! └── session/      ← CaptureNegotiator, CaptureSession, ByteStream
//! ```
//!
//! ## Usage
//! ```ignore
//! use mic_stream_core::{AutoGrant, CaptureConfig, CaptureNegotiator};
//!
//! let negotiator = CaptureNegotiator::new(backend, AutoGrant);
//! let stream = negotiator.request_stream(CaptureConfig::default()).await?;
//! let rate = negotiator.effective_sample_rate().await?;
//! ```

pub mod models;
pub mod session;
pub mod sync;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use models::config::{
    AudioFormat, AudioSource, CaptureConfig, ChannelConfig, OpenRequest, MAX_SAMPLE_RATE,
    MIN_SAMPLE_RATE,
};
pub use models::effective::EffectiveConfig;
pub use models::error::CaptureError;
pub use models::metadata::{SessionId, SessionMetadata};
pub use models::state::SessionEnd;
pub use session::byte_stream::ByteStream;
pub use session::capture_session::CaptureSession;
pub use session::negotiator::{CaptureNegotiator, NegotiatorOptions};
pub use sync::resolution::{Resolution, Waiter};
pub use traits::capture_backend::{BackendStream, CaptureBackend};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::permission_handler::{AutoGrant, PermissionHandler, PermissionStatus};
