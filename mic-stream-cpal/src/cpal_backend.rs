//! cpal input-device capture backend.
//!
//! Opens an input stream on the default (or a named) input device in the
//! requested rate, channel count and sample type. cpal streams are not `Send`,
//! so each session's stream is built and kept alive on its own thread.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use mic_stream_core::{AudioFormat, BackendStream, CaptureBackend, CaptureError, OpenRequest};

use crate::sample_format::{encode, pack_i24, SampleSpec};

type Feed = mpsc::UnboundedSender<Result<Bytes, CaptureError>>;

/// What the device actually accepted for the current session.
#[derive(Debug)]
struct GrantedFormat {
    sample_rate: u32,
    bit_depth: u32,
    /// Bytes in the first callback buffer; unknown until audio flows.
    buffer_size: Mutex<Option<u32>>,
}

/// Microphone capture through cpal.
pub struct CpalBackend {
    device_name: Option<String>,
    granted: Mutex<Option<Arc<GrantedFormat>>>,
}

impl CpalBackend {
    /// Capture from the host's default input device.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            granted: Mutex::new(None),
        }
    }

    /// Capture from the input device with this name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            granted: Mutex::new(None),
        }
    }

    /// Names of the input devices on the default host.
    pub fn list_input_devices() -> Result<Vec<String>, CaptureError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| CaptureError::backend(format!("failed to enumerate devices: {}", e)))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    fn current(&self) -> Result<Arc<GrantedFormat>, CaptureError> {
        self.granted
            .lock()
            .clone()
            .ok_or_else(|| CaptureError::backend("no capture session open"))
    }
}

#[async_trait]
impl CaptureBackend for CpalBackend {
    async fn open(&self, request: OpenRequest) -> Result<BackendStream, CaptureError> {
        let spec = SampleSpec::from_request(&request)?;
        let granted = Arc::new(GrantedFormat {
            sample_rate: spec.sample_rate,
            bit_depth: spec.format.bit_depth(),
            buffer_size: Mutex::new(None),
        });

        let (feed, chunks) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = oneshot::channel();
        let running = Arc::new(AtomicBool::new(true));

        {
            let running = Arc::clone(&running);
            let granted = Arc::clone(&granted);
            let device_name = self.device_name.clone();
            thread::Builder::new()
                .name("cpal-mic-capture".into())
                .spawn(move || capture_thread(device_name, spec, granted, feed, running, ack_tx))
                .map_err(|e| CaptureError::backend(format!("failed to spawn capture thread: {}", e)))?;
        }

        match ack_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => return Err(error),
            Err(_) => return Err(CaptureError::backend("capture thread exited during open")),
        }

        log::info!(
            "cpal input opened: {} Hz, {} ch, {:?}",
            spec.sample_rate,
            spec.channels,
            spec.format
        );
        *self.granted.lock() = Some(granted);
        Ok(CaptureStream { chunks, running }.boxed())
    }

    async fn sample_rate(&self) -> Result<f64, CaptureError> {
        Ok(self.current()?.sample_rate as f64)
    }

    async fn bit_depth(&self) -> Result<u32, CaptureError> {
        Ok(self.current()?.bit_depth)
    }

    async fn buffer_size(&self) -> Result<u32, CaptureError> {
        let granted = self.current()?;
        let size = *granted.buffer_size.lock();
        size.ok_or_else(|| CaptureError::backend("no audio delivered yet"))
    }
}

/// Chunks of one cpal session. Dropping it stops the capture thread.
struct CaptureStream {
    chunks: mpsc::UnboundedReceiver<Result<Bytes, CaptureError>>,
    running: Arc<AtomicBool>,
}

impl Stream for CaptureStream {
    type Item = Result<Bytes, CaptureError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.chunks.poll_recv(cx)
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Builds the stream, reports the outcome on `ack`, then keeps the stream
/// alive until the consumer lets go.
fn capture_thread(
    device_name: Option<String>,
    spec: SampleSpec,
    granted: Arc<GrantedFormat>,
    feed: Feed,
    running: Arc<AtomicBool>,
    ack: oneshot::Sender<Result<(), CaptureError>>,
) {
    let stream = match find_device(device_name.as_deref())
        .and_then(|device| build_stream(&device, spec, granted, feed.clone()))
    {
        Ok(stream) => stream,
        Err(error) => {
            log::error!("cpal input failed to open: {}", error);
            let _ = ack.send(Err(error));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ack.send(Err(CaptureError::backend(format!("failed to start stream: {}", e))));
        return;
    }
    if ack.send(Ok(())).is_err() {
        // The open call was abandoned.
        return;
    }

    while running.load(Ordering::SeqCst) && !feed.is_closed() {
        thread::sleep(Duration::from_millis(10));
    }

    drop(stream);
    log::debug!("cpal input closed");
}

fn find_device(name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::backend("no input device")),
        Some(name) => host
            .input_devices()
            .map_err(|e| CaptureError::backend(format!("failed to enumerate devices: {}", e)))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| CaptureError::backend(format!("input device not found: {}", name))),
    }
}

fn build_stream(
    device: &cpal::Device,
    spec: SampleSpec,
    granted: Arc<GrantedFormat>,
    feed: Feed,
) -> Result<cpal::Stream, CaptureError> {
    let config = cpal::StreamConfig {
        channels: spec.channels,
        sample_rate: cpal::SampleRate(spec.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let error_feed = feed.clone();
    let on_error = move |err: cpal::StreamError| {
        log::error!("cpal stream error: {}", err);
        let _ = error_feed.send(Err(CaptureError::backend(err.to_string())));
    };

    let forward = move |chunk: Bytes| {
        granted
            .buffer_size
            .lock()
            .get_or_insert(chunk.len() as u32);
        let _ = feed.send(Ok(chunk));
    };

    let result = match spec.format {
        AudioFormat::Pcm8 => device.build_input_stream(
            &config,
            move |data: &[u8], _: &cpal::InputCallbackInfo| forward(encode(data)),
            on_error,
            None,
        ),
        AudioFormat::Pcm16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| forward(encode(data)),
            on_error,
            None,
        ),
        AudioFormat::PcmFloat => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| forward(encode(data)),
            on_error,
            None,
        ),
        AudioFormat::Pcm24Packed => device.build_input_stream(
            &config,
            move |data: &[i32], _: &cpal::InputCallbackInfo| forward(pack_i24(data)),
            on_error,
            None,
        ),
        AudioFormat::Pcm32 => device.build_input_stream(
            &config,
            move |data: &[i32], _: &cpal::InputCallbackInfo| forward(encode(data)),
            on_error,
            None,
        ),
    };

    result.map_err(|e| CaptureError::backend(format!("failed to build input stream: {}", e)))
}
