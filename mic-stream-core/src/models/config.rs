use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Lowest sample rate a capture request may ask for, in Hz.
pub const MIN_SAMPLE_RATE: u32 = 1;

/// Highest sample rate a capture request may ask for, in Hz.
pub const MAX_SAMPLE_RATE: u32 = 100_000;

/// Capture source preset requested from the backend.
///
/// The declaration order is the wire index sent in an [`OpenRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioSource {
    #[default]
    Default,
    Mic,
    VoiceUplink,
    VoiceDownlink,
    VoiceCall,
    Camcorder,
    VoiceRecognition,
    VoiceCommunication,
    RemoteSubmix,
    Unprocessed,
    VoicePerformance,
}

impl AudioSource {
    pub fn index(self) -> u32 {
        match self {
            Self::Default => 0,
            Self::Mic => 1,
            Self::VoiceUplink => 2,
            Self::VoiceDownlink => 3,
            Self::VoiceCall => 4,
            Self::Camcorder => 5,
            Self::VoiceRecognition => 6,
            Self::VoiceCommunication => 7,
            Self::RemoteSubmix => 8,
            Self::Unprocessed => 9,
            Self::VoicePerformance => 10,
        }
    }
}

/// Channel layout of the captured stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelConfig {
    #[default]
    Mono,
    Stereo,
}

impl ChannelConfig {
    /// Channel mask understood by the backend.
    pub fn mask(self) -> u32 {
        match self {
            Self::Mono => 16,
            Self::Stereo => 12,
        }
    }

    pub fn from_mask(mask: u32) -> Option<Self> {
        match mask {
            16 => Some(Self::Mono),
            12 => Some(Self::Stereo),
            _ => None,
        }
    }

    pub fn count(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// PCM sample encoding of the captured bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioFormat {
    #[default]
    Pcm8,
    Pcm16,
    PcmFloat,
    Pcm24Packed,
    Pcm32,
}

impl AudioFormat {
    /// Encoding code understood by the backend.
    pub fn code(self) -> u32 {
        match self {
            Self::Pcm16 => 2,
            Self::Pcm8 => 3,
            Self::PcmFloat => 4,
            Self::Pcm24Packed => 21,
            Self::Pcm32 => 22,
        }
    }

    /// Nominal bits per sample for this encoding.
    pub fn bit_depth(self) -> u32 {
        match self {
            Self::Pcm8 => 8,
            Self::Pcm16 => 16,
            Self::Pcm24Packed => 24,
            Self::PcmFloat | Self::Pcm32 => 32,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(Self::Pcm16),
            3 => Some(Self::Pcm8),
            4 => Some(Self::PcmFloat),
            21 => Some(Self::Pcm24Packed),
            22 => Some(Self::Pcm32),
            _ => None,
        }
    }
}

/// Requested capture configuration.
///
/// Two configs are the same request when every field matches; the negotiator
/// only reopens the backend when this comparison fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    pub source: AudioSource,

    /// Requested sample rate in Hz, within [`MIN_SAMPLE_RATE`]..=[`MAX_SAMPLE_RATE`].
    pub sample_rate: u32,

    pub channels: ChannelConfig,

    pub format: AudioFormat,
}

impl CaptureConfig {
    /// Build a config, rejecting an out-of-range sample rate.
    pub fn new(
        source: AudioSource,
        sample_rate: u32,
        channels: ChannelConfig,
        format: AudioFormat,
    ) -> Result<Self, CaptureError> {
        let config = Self {
            source,
            sample_rate,
            channels,
            format,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(CaptureError::InvalidArgument(format!(
                "sample rate {} outside {}..={}",
                self.sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            )));
        }
        Ok(())
    }

    /// Wire shape of this config for a backend open call.
    pub fn open_request(&self) -> OpenRequest {
        OpenRequest {
            source_index: self.source.index(),
            sample_rate: self.sample_rate,
            channel_mask: self.channels.mask(),
            format_code: self.format.code(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: AudioSource::Default,
            sample_rate: 16_000,
            channels: ChannelConfig::Mono,
            format: AudioFormat::Pcm8,
        }
    }
}

/// Arguments of a backend session-open call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenRequest {
    pub source_index: u32,
    pub sample_rate: u32,
    /// 16 for mono, 12 for stereo.
    pub channel_mask: u32,
    pub format_code: u32,
}

impl OpenRequest {
    /// Channel count implied by the mask, if the mask is recognised.
    pub fn channel_count(&self) -> Option<u16> {
        ChannelConfig::from_mask(self.channel_mask).map(ChannelConfig::count)
    }

    pub fn format(&self) -> Option<AudioFormat> {
        AudioFormat::from_code(self.format_code)
    }
}
