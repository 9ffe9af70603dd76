//! Client error types.

use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response.
    #[error("{message} (HTTP {status})")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from server.
        message: String,
    },

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// The request was cancelled before it completed.
    #[error("request cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self, Self::Api { status: 404, .. })
    }

    /// Check if this is an authentication error.
    ///
    /// The service answers 203 with a sign-in page when a token is rejected.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Api { status: 203 | 401 | 403, .. })
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Api { status: 429, .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status >= 500)
    }

    /// Check if retrying may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => self.is_rate_limited() || self.is_server_error(),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error body returned by the service.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "typeKey")]
    pub type_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let api = |status| ClientError::Api {
            status,
            message: "x".into(),
        };
        assert!(api(401).is_auth_error());
        assert!(api(403).is_auth_error());
        assert!(api(203).is_auth_error());
        assert!(api(404).is_not_found());
        assert!(api(429).is_transient());
        assert!(api(503).is_transient());
        assert!(!api(400).is_transient());
        assert!(!ClientError::Cancelled.is_transient());
    }
}
