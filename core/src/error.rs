//! Error types and wire response mapping

use serde::Serialize;
use thiserror::Error;

/// Result type alias for rotation authority operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// Rotation authority error with OAuth-style wire mapping
///
/// `InvalidGrant` deliberately collapses every unusable-token cause
/// (unknown, already rotated, revoked, expired, family revoked) into one
/// wire-indistinguishable error; the distinction lives only in the audit
/// trail.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid grant: {message}")]
    InvalidGrant { message: String },

    #[error("scope exceeded: {message}")]
    ScopeExceeded { message: String },

    #[error("upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },

    /// Per-family serialization conflict. Retried internally by the
    /// operation handlers and never returned to a caller.
    #[error("family state version conflict")]
    ConflictRetry,

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    pub fn scope_exceeded(message: impl Into<String>) -> Self {
        Self::ScopeExceeded {
            message: message.into(),
        }
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the caller may retry the operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidGrant { .. } => 400,
            Self::ScopeExceeded { .. } => 400,
            Self::UpstreamUnavailable { .. } => 503,
            Self::ConflictRetry => 500,
            Self::InvalidRequest { .. } => 400,
            Self::Internal { .. } => 500,
        }
    }

    /// Get the OAuth-style error key for this error
    pub fn error_key(&self) -> &'static str {
        match self {
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::ScopeExceeded { .. } => "invalid_scope",
            Self::UpstreamUnavailable { .. } => "temporarily_unavailable",
            Self::ConflictRetry => "server_error",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Internal { .. } => "server_error",
        }
    }

    /// Caller-facing description.
    ///
    /// `InvalidGrant` always maps to the same fixed text regardless of the
    /// underlying cause so the wire leaks nothing about family state.
    pub fn wire_description(&self) -> String {
        match self {
            Self::InvalidGrant { .. } => {
                "refresh token is invalid, expired, or revoked".to_string()
            }
            Self::ConflictRetry | Self::Internal { .. } => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Error response body (OAuth2 token endpoint shape)
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_description: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            error: err.error_key().to_string(),
            error_description: err.wire_description(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_grant_is_wire_indistinguishable() {
        let unknown = ApiError::invalid_grant("unknown refresh token");
        let reused = ApiError::invalid_grant("token reuse detected for family f1");
        let revoked = ApiError::invalid_grant("family revoked");

        let a = ErrorResponse::from(&unknown);
        let b = ErrorResponse::from(&reused);
        let c = ErrorResponse::from(&revoked);

        assert_eq!(a.error, "invalid_grant");
        assert_eq!(a.error_description, b.error_description);
        assert_eq!(b.error_description, c.error_description);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::invalid_grant("x").status_code(), 400);
        assert_eq!(ApiError::scope_exceeded("x").status_code(), 400);
        assert_eq!(ApiError::upstream_unavailable("x").status_code(), 503);
        assert_eq!(ApiError::internal("x").status_code(), 500);
        assert_eq!(ApiError::ConflictRetry.status_code(), 500);
    }

    #[test]
    fn test_only_upstream_is_retryable() {
        assert!(ApiError::upstream_unavailable("signer down").is_retryable());
        assert!(!ApiError::invalid_grant("x").is_retryable());
        assert!(!ApiError::scope_exceeded("x").is_retryable());
        assert!(!ApiError::ConflictRetry.is_retryable());
    }

    #[test]
    fn test_internal_detail_not_leaked() {
        let err = ApiError::internal("family index points at missing record");
        assert_eq!(err.wire_description(), "internal error");
    }
}
