use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::models::config::OpenRequest;
use crate::models::error::CaptureError;

/// Raw audio chunks produced by one open backend session.
///
/// Dropping the stream releases the backend session.
pub type BackendStream = BoxStream<'static, Result<Bytes, CaptureError>>;

/// Interface for the subsystem that owns the microphone.
///
/// Implemented by:
/// - `CpalBackend` (`mic-stream-cpal`, feature `cpal`)
/// - the fake backend used by this crate's tests
#[async_trait]
pub trait CaptureBackend: Send + Sync + 'static {
    /// Open a capture session and start producing chunks.
    ///
    /// Resolves once the backend has acknowledged the open.
    async fn open(&self, request: OpenRequest) -> Result<BackendStream, CaptureError>;

    /// Actual sample rate of the current session, possibly fractional.
    async fn sample_rate(&self) -> Result<f64, CaptureError>;

    /// Actual bits per sample of the current session.
    async fn bit_depth(&self) -> Result<u32, CaptureError>;

    /// Actual buffer size, in bytes, of the current session.
    async fn buffer_size(&self) -> Result<u32, CaptureError>;
}
