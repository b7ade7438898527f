//! Messages exchanged with browser clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    audio::Levels,
    common::{RelayError, RelayResult},
};

/// `type` of the structured messages the relay interprets itself.
pub const CONTROL_TYPE: &str = "ambient.control";

/// Local control commands, `{"type":"ambient.control","action":…}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum AmbientCommand {
    Toggle,
    Switch,
    Levels {
        #[serde(default)]
        levels: LevelsRequest,
    },
    Start,
    Stop,
}

/// Requested levels in percent. Absent values keep the current level.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LevelsRequest {
    pub ambient: Option<f64>,
    pub voice: Option<f64>,
}

/// Returns the command carried by `text`, or `None` if the frame is anything
/// else (and therefore belongs to the gateway). A frame typed
/// `ambient.control` whose action cannot be read is a `ProtocolParse` error.
pub fn parse_command(text: &str) -> RelayResult<Option<AmbientCommand>> {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Ok(None);
    };
    if value.get("type").and_then(Value::as_str) != Some(CONTROL_TYPE) {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| RelayError::ProtocolParse(format!("{}: {}", CONTROL_TYPE, e)))
}

/// Everything the relay itself says to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "ambient.status", rename_all = "camelCase")]
    AmbientStatus {
        enabled: bool,
        is_loaded: bool,
        current: Option<String>,
    },
    #[serde(rename = "ambient.switched")]
    AmbientSwitched {
        success: bool,
        current: Option<String>,
    },
    #[serde(rename = "ambient.levels")]
    AmbientLevels { levels: Levels },
    #[serde(rename = "ambient.streaming")]
    AmbientStreaming { active: bool },
    #[serde(rename = "ambient.audio", rename_all = "camelCase")]
    AmbientAudio {
        /// Base64 PCM16 LE.
        audio: String,
        sample_rate: u32,
        samples: usize,
    },
    #[serde(rename = "session.update")]
    SessionUpdate { message: String },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn update(message: impl Into<String>) -> Self {
        Self::SessionUpdate {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
