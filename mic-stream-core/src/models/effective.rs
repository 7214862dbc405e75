use serde::{Deserialize, Serialize};

/// Configuration the backend actually granted.
///
/// Each field is reported independently; `None` means the backend query for
/// it failed or the stream ended before any data arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub sample_rate: Option<u32>,
    pub bit_depth: Option<u32>,
    pub buffer_size: Option<u32>,
}

impl EffectiveConfig {
    /// Sentinel used when nothing could be learned from the backend.
    pub const fn unknown() -> Self {
        Self {
            sample_rate: None,
            bit_depth: None,
            buffer_size: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }

    /// Convert a backend-reported sample rate to whole Hz.
    ///
    /// Backends report fractional rates (e.g. 44099.6); non-finite or
    /// non-positive values are treated as unknown.
    pub fn rate_from_backend(rate: f64) -> Option<u32> {
        if !rate.is_finite() || rate <= 0.0 || rate > u32::MAX as f64 {
            return None;
        }
        Some(rate.round() as u32)
    }
}
