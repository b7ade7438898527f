//! Classification of frames arriving from the speech gateway.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde_json::{Map, Value};

use crate::{
    common::{RelayError, RelayResult},
    protocol::Frame,
};

/// What the relay sees in one gateway frame.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayFrame {
    /// Binary, or text that is not a JSON object.
    Opaque,
    /// A JSON event the relay passes through unchanged.
    Event,
    /// An audio-output envelope whose `delta` carries base64 PCM16.
    AudioDelta(AudioDelta),
}

impl GatewayFrame {
    pub fn classify(frame: &Frame, audio_delta_type: &str) -> Self {
        let Some(text) = frame.as_text() else {
            return Self::Opaque;
        };
        let Ok(Value::Object(envelope)) = serde_json::from_str::<Value>(text) else {
            return Self::Opaque;
        };

        let is_delta = envelope.get("type").and_then(Value::as_str) == Some(audio_delta_type)
            && envelope.get("delta").is_some_and(Value::is_string);

        if is_delta {
            Self::AudioDelta(AudioDelta { envelope })
        } else {
            Self::Event
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioDelta {
    envelope: Map<String, Value>,
}

impl AudioDelta {
    pub fn payload(&self) -> &str {
        self.envelope
            .get("delta")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Decodes the payload, runs it through `transform` and returns the
    /// envelope re-serialized around the re-encoded result. Every other
    /// field is kept.
    pub fn rewrite(
        mut self,
        transform: impl FnOnce(&[u8]) -> RelayResult<Vec<u8>>,
    ) -> RelayResult<String> {
        let pcm = BASE64_STANDARD.decode(self.payload())?;
        if pcm.is_empty() {
            return Err(RelayError::Mixing("empty audio payload".into()));
        }

        let mixed = transform(&pcm)?;
        self.envelope
            .insert("delta".into(), Value::String(BASE64_STANDARD.encode(mixed)));

        Ok(serde_json::to_string(&self.envelope)?)
    }
}
