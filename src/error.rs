//! Error types for the geo assistant

use thiserror::Error;

use crate::location::LocationFailure;

/// Result type alias for geo assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the geo assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Position could not be determined
    #[error("location unavailable: {0}")]
    LocationUnavailable(#[from] LocationFailure),

    /// Speech capture produced nothing usable
    #[error("speech recognition failed: {0}")]
    SpeechCapture(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Assistant backend answered with a non-success status
    #[error("API request failed ({status}): {body}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Upstream completion service error (relay side)
    #[error("upstream error: {0}")]
    Upstream(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// User-facing failure categories surfaced as transient notices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No location capability, permission denied, or timeout
    LocationUnavailable,
    /// No speech detected or the capture adapter failed
    SpeechCaptureFailed,
    /// The request never got a response
    NetworkFailure,
    /// The backend answered with a failure
    BackendError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocationUnavailable => write!(f, "location unavailable"),
            Self::SpeechCaptureFailed => write!(f, "speech capture failed"),
            Self::NetworkFailure => write!(f, "network failure"),
            Self::BackendError => write!(f, "backend error"),
        }
    }
}

impl Error {
    /// Map this error onto the user-facing taxonomy, if it belongs to one
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::LocationUnavailable(_) => Some(ErrorKind::LocationUnavailable),
            Self::SpeechCapture(_) | Self::Stt(_) | Self::Audio(_) => {
                Some(ErrorKind::SpeechCaptureFailed)
            }
            Self::Http(e) if e.is_decode() => Some(ErrorKind::BackendError),
            Self::Http(_) => Some(ErrorKind::NetworkFailure),
            Self::Backend { .. } | Self::Serialization(_) | Self::Upstream(_) => {
                Some(ErrorKind::BackendError)
            }
            Self::Config(_) | Self::Tts(_) | Self::Io(_) | Self::Toml(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_status_maps_to_backend_error() {
        let err = Error::Backend {
            status: 502,
            body: String::new(),
        };
        assert_eq!(err.kind(), Some(ErrorKind::BackendError));
        assert_eq!(err.to_string(), "API request failed (502): ");
    }

    #[test]
    fn location_failure_keeps_its_message() {
        let err = Error::from(LocationFailure::PermissionDenied);
        assert_eq!(err.kind(), Some(ErrorKind::LocationUnavailable));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn config_errors_are_not_user_notices() {
        assert_eq!(Error::Config("bad".to_string()).kind(), None);
    }
}
