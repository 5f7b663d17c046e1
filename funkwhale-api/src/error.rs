//! Error types for the Funkwhale API client.

use std::path::PathBuf;
use thiserror::Error;

/// Maximum number of response-body bytes kept in [`FunkwhaleError::Status`].
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Errors that can occur when talking to a Funkwhale server.
#[derive(Debug, Error)]
pub enum FunkwhaleError {
    /// HTTP transport error (connection refused, timeout, TLS failure, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status that has no more specific
    /// meaning. `401` on an OAuth session is reported as
    /// [`InvalidToken`](Self::InvalidToken) instead.
    #[error("server returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for display.
        body: String,
    },

    /// The OAuth credential is missing, revoked or no longer usable.
    ///
    /// The user has to visit `authorization_url`, grant access and hand the
    /// resulting code back to the session before retrying.
    #[error("invalid or missing token, authorize this application at {authorization_url}")]
    InvalidToken {
        /// URL the user must visit to grant access again.
        authorization_url: String,
    },

    /// The token endpoint rejected a grant.
    ///
    /// `error` is the RFC 6749 error code, e.g. `invalid_grant`.
    #[error("token endpoint rejected the request: {error}{}", .description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    OAuth {
        /// OAuth2 error code.
        error: String,
        /// Optional human-readable description from the server.
        description: Option<String>,
    },

    /// The `state` parameter of an authorization redirect did not match the
    /// one this session generated.
    #[error("authorization state mismatch, possible CSRF")]
    StateMismatch,

    /// An OAuth-only operation was called on a basic-auth session.
    #[error("operation requires an OAuth session")]
    NotOAuth,

    /// The persisted token file does not exist.
    #[error("token file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A caller-supplied enumerated parameter is not in the accepted set.
    #[error("invalid value `{value}` for `{field}`, expected one of: {}", .accepted.join(", "))]
    Validation {
        /// Parameter name.
        field: &'static str,
        /// Rejected value.
        value: String,
        /// Values the endpoint accepts.
        accepted: &'static [&'static str],
    },

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed URL (domain, endpoint or redirect).
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// File I/O error (token or config read/write, download write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to (de)serialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FunkwhaleError {
    /// Build a [`Status`](Self::Status) error, truncating long bodies.
    pub(crate) fn status(status: u16, body: &str) -> Self {
        let body = if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_owned()
        } else {
            let mut cut = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        };
        Self::Status { status, body }
    }

    /// Returns `true` if re-authorization is required.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, Self::InvalidToken { .. })
    }

    /// The remediation URL carried by [`InvalidToken`](Self::InvalidToken).
    pub fn authorization_url(&self) -> Option<&str> {
        match self {
            Self::InvalidToken { authorization_url } => Some(authorization_url),
            _ => None,
        }
    }
}

/// Convenience alias for `Result<T, FunkwhaleError>`.
pub type Result<T> = std::result::Result<T, FunkwhaleError>;
