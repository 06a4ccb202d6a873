//! Error types for the client crate.

use thiserror::Error;

/// Result type for client construction.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for remote calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors raised while building a client.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// URL parse error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// HTTP client construction error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a config error.
    pub fn config_error(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }
}

/// A failed remote call.
///
/// Carries enough of the response (status and body) for retry logging even
/// when the caller does not classify by status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The remote answered with a non-success status.
    #[error("remote returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a response.
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// The response body was not valid JSON.
    #[error("invalid response ({status}): {reason}")]
    InvalidResponse { status: u16, reason: String },

    /// The request could not be built.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
}

impl ApiError {
    /// Create a status error.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(status: u16, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            status,
            reason: reason.into(),
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// HTTP status of the failed response, if one was received.
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::InvalidResponse { status, .. } => Some(*status),
            Self::Transport { .. } | Self::InvalidRequest { .. } => None,
        }
    }

    /// Response body (or failure reason) for logging.
    pub fn body(&self) -> &str {
        match self {
            Self::Status { body, .. } => body,
            Self::Transport { reason }
            | Self::InvalidResponse { reason, .. }
            | Self::InvalidRequest { reason } => reason,
        }
    }

    /// Whether the remote reported the object as absent.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Whether the failure looks transient (transport, throttling, 5xx).
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => matches!(*status, 408 | 409 | 429 | 500..=599),
            Self::InvalidResponse { .. } | Self::InvalidRequest { .. } => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::status(status.as_u16(), err.to_string()),
            None => Self::transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found() {
        assert!(ApiError::status(404, "no such account").is_not_found());
        assert!(!ApiError::status(500, "boom").is_not_found());
        assert!(!ApiError::transport("refused").is_not_found());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::transport("connection reset").is_retryable());
        assert!(ApiError::status(503, "").is_retryable());
        assert!(ApiError::status(409, "account is still syncing").is_retryable());
        assert!(!ApiError::status(400, "malformed request").is_retryable());
        assert!(!ApiError::invalid_response(200, "expected value").is_retryable());
    }

    #[test]
    fn test_status_and_body() {
        let err = ApiError::status(502, "bad gateway");
        assert_eq!(err.status_code(), Some(502));
        assert_eq!(err.body(), "bad gateway");
        assert_eq!(ApiError::transport("dns").status_code(), None);
        assert!(err.to_string().contains("502"));
    }
}
