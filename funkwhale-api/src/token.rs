//! OAuth token credential and token-endpoint response parsing.

use crate::error::{FunkwhaleError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Grace period, in seconds, past `expires_at` before a token is refreshed.
pub const EXPIRY_MARGIN_SECS: f64 = 60.0;

/// Current time as fractional Unix epoch seconds.
#[allow(clippy::cast_precision_loss)]
pub fn now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// An OAuth2 bearer credential, in the shape persisted to disk.
///
/// Unknown fields returned by the token endpoint (`scope`, `expires_in`, ...)
/// are kept in `extra` and written back verbatim.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry, Unix epoch seconds.
    pub expires_at: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OAuthToken {
    /// Parse a persisted token record.
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// `true` once `now` is more than [`EXPIRY_MARGIN_SECS`] past
    /// `expires_at`.
    pub fn is_expired_at(&self, now: f64) -> bool {
        now - EXPIRY_MARGIN_SECS > self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now())
    }

    /// Value for the `Authorization` header: `<token_type> <access_token>`.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Scope granted by the server, if it reported one.
    pub fn scope(&self) -> Option<&str> {
        self.extra.get("scope").and_then(Value::as_str)
    }

    /// Whether the granted scope includes every requested scope.
    ///
    /// A token without a `scope` field is assumed to carry what was asked for.
    pub fn covers(&self, requested: &[String]) -> bool {
        match self.scope() {
            None => true,
            Some(granted) => {
                let granted: Vec<&str> = granted.split_whitespace().collect();
                requested.iter().all(|s| granted.contains(&s.as_str()))
            }
        }
    }
}

impl fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Successful token-endpoint response (RFC 6749 §5.1).
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<f64>,
    #[serde(default)]
    expires_at: Option<f64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn default_token_type() -> String {
    "Bearer".to_owned()
}

impl TokenResponse {
    /// Convert into a credential, anchoring `expires_in` at `now`.
    pub(crate) fn into_token(self, now: f64) -> Result<OAuthToken> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at,
            (None, Some(secs)) => now + secs,
            (None, None) => {
                return Err(FunkwhaleError::OAuth {
                    error: "invalid_response".into(),
                    description: Some("token response has neither expires_in nor expires_at".into()),
                });
            }
        };
        let mut extra = self.extra;
        if let Some(secs) = self.expires_in {
            extra.insert("expires_in".into(), Value::from(secs));
        }
        Ok(OAuthToken {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token,
            expires_at,
            extra,
        })
    }
}

/// Error body returned by the token endpoint (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub(crate) error: String,
    #[serde(default)]
    pub(crate) error_description: Option<String>,
}
