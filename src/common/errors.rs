use thiserror::Error;

/// Failure kinds of the relay. None of them is fatal to the process; each is
/// scoped to the session (or startup step) that raised it.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Gateway unreachable, handshake rejected, or a send on a dead link.
    #[error("gateway connection error: {0}")]
    Connection(String),

    /// A structured frame that could not be parsed.
    #[error("malformed frame: {0}")]
    ProtocolParse(String),

    /// Ambient asset missing, empty or corrupt.
    #[error("ambient asset {path}: {reason}")]
    AssetLoad { path: String, reason: String },

    /// A voice frame that could not be mixed.
    #[error("mixing failed: {0}")]
    Mixing(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RelayError {
    pub fn asset(path: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::AssetLoad {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RelayError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connection(e.to_string())
    }
}

impl From<base64::DecodeError> for RelayError {
    fn from(e: base64::DecodeError) -> Self {
        Self::Mixing(format!("invalid base64 payload: {}", e))
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_error_names_the_path() {
        let err = RelayError::asset("ambient/office.pcm", "file is empty");
        assert_eq!(err.to_string(), "ambient asset ambient/office.pcm: file is empty");
    }

    #[test]
    fn base64_errors_are_mixing_errors() {
        use base64::Engine;
        let err: RelayError = base64::engine::general_purpose::STANDARD
            .decode("!!!")
            .unwrap_err()
            .into();
        assert!(matches!(err, RelayError::Mixing(_)));
    }
}
