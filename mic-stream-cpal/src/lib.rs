//! # mic-stream-cpal
//!
//! cpal input-device backend for mic-stream.
//!
//! Provides:
//! - `CpalBackend` — `CaptureBackend` over a cpal input device (feature `cpal`)
//! - `sample_format` — request decoding and little-endian sample packing
//!
//! cpal has no capture permission model; pair the backend with
//! `mic_stream_core::AutoGrant`.
//!
//! ## Platform Requirements
//! - Linux: ALSA development headers (`libasound2-dev`) when `cpal` is enabled
//!
//! ## Usage
//! ```ignore
//! use mic_stream_core::{AutoGrant, CaptureConfig, CaptureNegotiator};
//! use mic_stream_cpal::CpalBackend;
//!
//! let negotiator = CaptureNegotiator::new(CpalBackend::default_device(), AutoGrant);
//! let stream = negotiator.request_stream(CaptureConfig::default()).await?;
//! ```

#[cfg(feature = "cpal")]
pub mod cpal_backend;
pub mod sample_format;

#[cfg(feature = "cpal")]
pub use cpal_backend::CpalBackend;
pub use sample_format::{encode, pack_i24, PcmSample, SampleSpec};
