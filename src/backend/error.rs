use thiserror::Error;

/// Errors surfaced by the hosted backend client.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Client misconfigured (bad URL, missing key). Not retryable.
    #[error("config error: {0}")]
    Config(String),
    /// Transport-level failure (timeout, DNS, connection refused).
    #[error("network error: {0}")]
    Network(String),
    /// The backend answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    /// Credentials rejected or session missing.
    #[error("{0}")]
    Auth(String),
    /// Response body did not match the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
    /// The addressed row does not exist (or row-level security hides it).
    #[error("not found: {0}")]
    NotFound(String),
    /// Input rejected before any request was made.
    #[error("{0}")]
    Validation(String),
    /// The change feed connection went away.
    #[error("change feed closed")]
    Closed,
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Parse(err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Parse(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BackendError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        BackendError::Network(err.to_string())
    }
}

/// Extracts a human-readable message from a PostgREST or GoTrue error body.
///
/// PostgREST uses `message`; GoTrue has used `error_description`, `msg`
/// and `error` across versions. Falls back to the raw body.
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str())
                && !text.is_empty()
            {
                return text.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "unknown error".to_string()
    } else {
        trimmed.to_string()
    }
}
