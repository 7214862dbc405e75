use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::CaptureConfig;
use super::effective::EffectiveConfig;

/// Identity of one capture session.
///
/// Two streams with the same id come from the same backend session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serializable snapshot of a session, for diagnostics and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub id: SessionId,
    pub opened_at: DateTime<Utc>,
    pub requested: CaptureConfig,
    pub effective: Option<EffectiveConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{AudioFormat, AudioSource, ChannelConfig};

    #[test]
    fn metadata_serializes_camel_case() {
        let metadata = SessionMetadata {
            id: SessionId::new(),
            opened_at: Utc::now(),
            requested: CaptureConfig {
                source: AudioSource::VoiceRecognition,
                sample_rate: 44_100,
                channels: ChannelConfig::Stereo,
                format: AudioFormat::Pcm16,
            },
            effective: Some(EffectiveConfig {
                sample_rate: Some(44_100),
                bit_depth: Some(16),
                buffer_size: None,
            }),
        };

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["id"], metadata.id.to_string());
        assert_eq!(json["requested"]["source"], "voiceRecognition");
        assert_eq!(json["requested"]["sampleRate"], 44_100);
        assert_eq!(json["requested"]["channels"], "stereo");
        assert_eq!(json["requested"]["format"], "pcm16");
        assert_eq!(json["effective"]["bitDepth"], 16);
        assert!(json["effective"]["bufferSize"].is_null());
        assert!(json["openedAt"].is_string());
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
