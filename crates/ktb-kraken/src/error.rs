//! Error types of the exchange client.

use std::fmt;

use thiserror::Error;

/// Failure of a single transport attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Key missing, secret not valid base64, or a header that cannot be built.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// HTTP 503 from the exchange.
    #[error("service unavailable")]
    ServiceUnavailable,

    /// Any other non-success HTTP status.
    #[error("HTTP status {0}")]
    Http(u16),

    /// Connect, TLS or timeout failure.
    #[error("network error: {0}")]
    Network(String),

    /// Body was not a Kraken envelope.
    #[error("undecodable response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Credential problems and maintenance windows do not improve on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidCredentials(_) | Self::ServiceUnavailable)
    }
}

/// Error list returned to callers. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    messages: Vec<String>,
}

impl ApiError {
    pub fn new(mut messages: Vec<String>) -> Self {
        if messages.is_empty() {
            messages.push("unknown error".to_string());
        }
        Self { messages }
    }

    pub fn single(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }

    pub fn malformed(what: impl fmt::Display) -> Self {
        Self::single(format!("malformed response: {what}"))
    }

    pub fn first(&self) -> &str {
        &self.messages[0]
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        Self::single(e.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages.join("; "))
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_is_never_empty() {
        let e = ApiError::new(Vec::new());
        assert_eq!(e.messages().len(), 1);
        assert_eq!(e.first(), "unknown error");
    }

    #[test]
    fn classification() {
        assert!(!TransportError::ServiceUnavailable.is_retryable());
        assert!(!TransportError::InvalidCredentials("x".into()).is_retryable());
        assert!(TransportError::Http(502).is_retryable());
        assert!(TransportError::Network("timeout".into()).is_retryable());
    }
}
