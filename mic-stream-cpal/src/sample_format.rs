//! Wire-code decoding and sample-to-byte packing.
//!
//! Captured samples are delivered to consumers as little-endian bytes in the
//! requested encoding. 24-bit packed audio is captured as `i32` and keeps the
//! top three bytes of each sample.

use bytes::Bytes;
use mic_stream_core::{AudioFormat, CaptureError, OpenRequest};

/// Concrete capture format decoded from an [`OpenRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: AudioFormat,
}

impl SampleSpec {
    pub fn from_request(request: &OpenRequest) -> Result<Self, CaptureError> {
        let channels = request.channel_count().ok_or_else(|| {
            CaptureError::InvalidArgument(format!(
                "unsupported channel mask: {}",
                request.channel_mask
            ))
        })?;
        let format = request.format().ok_or_else(|| {
            CaptureError::InvalidArgument(format!(
                "unsupported format code: {}",
                request.format_code
            ))
        })?;
        Ok(Self {
            sample_rate: request.sample_rate,
            channels,
            format,
        })
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self.format {
            AudioFormat::Pcm8 => 1,
            AudioFormat::Pcm16 => 2,
            AudioFormat::Pcm24Packed => 3,
            AudioFormat::PcmFloat | AudioFormat::Pcm32 => 4,
        }
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }
}

/// A sample type whose in-memory layout can be shipped as bytes.
pub trait PcmSample: bytemuck::Pod {
    /// This sample with its bytes in little-endian order.
    fn to_le(self) -> Self;
}

impl PcmSample for u8 {
    fn to_le(self) -> Self {
        self
    }
}

impl PcmSample for i16 {
    fn to_le(self) -> Self {
        i16::to_le(self)
    }
}

impl PcmSample for i32 {
    fn to_le(self) -> Self {
        i32::to_le(self)
    }
}

impl PcmSample for f32 {
    fn to_le(self) -> Self {
        f32::from_bits(self.to_bits().to_le())
    }
}

/// Copy `samples` into a chunk of little-endian bytes.
pub fn encode<T: PcmSample>(samples: &[T]) -> Bytes {
    if cfg!(target_endian = "little") {
        Bytes::copy_from_slice(bytemuck::cast_slice(samples))
    } else {
        let swapped: Vec<T> = samples.iter().map(|s| s.to_le()).collect();
        Bytes::copy_from_slice(bytemuck::cast_slice(&swapped))
    }
}

/// Pack 32-bit samples as 24-bit little-endian, dropping the lowest byte.
pub fn pack_i24(samples: &[i32]) -> Bytes {
    let mut out = Vec::with_capacity(samples.len() * 3);
    for &sample in samples {
        let le = (sample >> 8).to_le_bytes();
        out.extend_from_slice(&le[..3]);
    }
    Bytes::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mic_stream_core::{AudioSource, CaptureConfig, ChannelConfig};

    #[test]
    fn spec_from_stereo_16bit_request() {
        let config = CaptureConfig {
            source: AudioSource::Mic,
            sample_rate: 44_100,
            channels: ChannelConfig::Stereo,
            format: AudioFormat::Pcm16,
        };
        let spec = SampleSpec::from_request(&config.open_request()).unwrap();
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.format, AudioFormat::Pcm16);
        assert_eq!(spec.bytes_per_frame(), 4);
    }

    #[test]
    fn unknown_codes_are_rejected() {
        let mut request = CaptureConfig::default().open_request();
        request.channel_mask = 3;
        assert!(matches!(
            SampleSpec::from_request(&request),
            Err(CaptureError::InvalidArgument(_))
        ));

        let mut request = CaptureConfig::default().open_request();
        request.format_code = 99;
        assert!(matches!(
            SampleSpec::from_request(&request),
            Err(CaptureError::InvalidArgument(_))
        ));
    }

    #[test]
    fn packed_24bit_frame_width() {
        let mut request = CaptureConfig::default().open_request();
        request.format_code = AudioFormat::Pcm24Packed.code();
        let spec = SampleSpec::from_request(&request).unwrap();
        assert_eq!(spec.bytes_per_sample(), 3);
        assert_eq!(spec.bytes_per_frame(), 3);
    }

    #[test]
    fn encode_is_little_endian() {
        assert_eq!(encode(&[0x0102i16, -2]).as_ref(), &[0x02, 0x01, 0xFE, 0xFF]);
        assert_eq!(encode(&[1.0f32]).as_ref(), &1.0f32.to_le_bytes());
        assert_eq!(encode(&[0x80u8, 0x7F]).as_ref(), &[0x80, 0x7F]);
    }

    #[test]
    fn pack_i24_keeps_top_three_bytes() {
        let packed = pack_i24(&[0x1234_5678, -256]);
        assert_eq!(packed.as_ref(), &[0x56, 0x34, 0x12, 0xFF, 0xFF, 0xFF]);
    }
}
