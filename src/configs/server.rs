use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Where and how to reach the realtime speech gateway.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base websocket URL; the model is appended as `?model=`.
    pub url: String,
    pub model: String,
    /// Bearer token. Usually supplied through `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Value of the `OpenAI-Beta` header, omitted when empty.
    pub beta_header: String,
    /// Envelope `type` whose payload gets the ambient bed mixed in.
    pub audio_delta_type: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.openai.com/v1/realtime".to_string(),
            model: "gpt-4o-realtime-preview-2024-12-17".to_string(),
            api_key: None,
            beta_header: "realtime=v1".to_string(),
            audio_delta_type: "response.audio.delta".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn endpoint(&self) -> String {
        if self.model.is_empty() {
            return self.url.clone();
        }
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}model={}", self.url, sep, self.model)
    }
}
