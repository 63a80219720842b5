use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider misconfigured (missing API key, bad URL). Not retryable.
    #[error("config error: {0}")]
    Config(String),
    /// Network-level failure (timeout, DNS, connection refused). Retryable.
    #[error("network error: {0}")]
    Network(String),
    /// API returned an error response. Retryable if status >= 500 or 429.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    /// Failed to parse the provider's response. Not retryable.
    #[error("parse error: {0}")]
    Parse(String),
    /// The prompt or the answer was withheld by the provider's safety filter.
    #[error("blocked by provider: {0}")]
    Blocked(String),
    /// The provider answered without any text.
    #[error("empty response")]
    Empty,
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) => true,
            ProviderError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the name of the provider.
    fn name(&self) -> &str;

    /// Generates a single, complete answer for `prompt`. The returned text is
    /// trimmed and never empty.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(ProviderError::Api { status: 503, message: String::new() }.is_retryable());
        assert!(ProviderError::Api { status: 429, message: String::new() }.is_retryable());
        assert!(!ProviderError::Api { status: 400, message: String::new() }.is_retryable());
        assert!(!ProviderError::Blocked("SAFETY".into()).is_retryable());
        assert!(!ProviderError::Empty.is_retryable());
    }
}
