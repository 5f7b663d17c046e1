//! Connection parameters for a [`Session`](crate::Session).
//!
//! A config can be built in code or loaded from a JSON file, by default
//! `~/.config/funkwhale/config.json`:
//!
//! ```json
//! {
//!   "client_name": "my-player",
//!   "redirect_uri": "urn:ietf:wg:oauth:2.0:oob",
//!   "client_id": "abc",
//!   "client_secret": "def",
//!   "scopes": ["read", "write"],
//!   "domain": "https://demo.funkwhale.audio",
//!   "login_endpoint": "/api/v1/oauth/token/",
//!   "authorization_endpoint": "/authorize",
//!   "token_path": "/home/me/.config/funkwhale/token.json"
//! }
//! ```
//!
//! The login endpoint decides the strategy: if it contains `"oauth"` the
//! session runs the OAuth2 authorization-code flow, otherwise it sends
//! `username`/`password` as HTTP basic auth on every request.

use crate::error::{FunkwhaleError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "funkwhale";
const CONFIG_FILE: &str = "config.json";
const TOKEN_FILE: &str = "token.json";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Substring of the login endpoint that selects the OAuth strategy.
const OAUTH_MARKER: &str = "oauth";

/// Immutable connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Base address of the instance, e.g. `https://demo.funkwhale.audio`.
    pub domain: String,
    /// Path (relative to `domain`) or absolute URL of the login endpoint.
    pub login_endpoint: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// OAuth only. Defaults to `<domain>/authorize`.
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    /// OAuth only. Defaults to [`default_token_path`](Self::default_token_path).
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    /// Basic only: issue one authenticated GET to
    /// [`warm_up_url`](Self::warm_up_url) while constructing the session.
    #[serde(default)]
    pub warm_up: bool,
    /// Path or absolute URL checked by the warm-up. Must answer `GET`;
    /// defaults to the login endpoint.
    #[serde(default)]
    pub warm_up_endpoint: Option<String>,
    /// Transport timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_client_name() -> String {
    env!("CARGO_PKG_NAME").to_owned()
}

fn default_scopes() -> Vec<String> {
    vec!["read".to_owned()]
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl SessionConfig {
    /// Config for a direct username/password login.
    pub fn basic(
        domain: impl Into<String>,
        login_endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::bare(domain.into(), login_endpoint.into())
        }
    }

    /// Config for the OAuth2 authorization-code flow.
    pub fn oauth(
        domain: impl Into<String>,
        login_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            redirect_uri: redirect_uri.into(),
            ..Self::bare(domain.into(), login_endpoint.into())
        }
    }

    fn bare(domain: String, login_endpoint: String) -> Self {
        Self {
            client_name: default_client_name(),
            redirect_uri: String::new(),
            client_id: None,
            client_secret: None,
            scopes: default_scopes(),
            domain,
            login_endpoint,
            username: None,
            password: None,
            authorization_endpoint: None,
            token_path: None,
            warm_up: false,
            warm_up_endpoint: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    #[must_use]
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_authorization_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authorization_endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_warm_up(mut self, warm_up: bool) -> Self {
        self.warm_up = warm_up;
        self
    }

    /// Enable the warm-up request against `endpoint` instead of the login
    /// endpoint.
    #[must_use]
    pub fn with_warm_up_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.warm_up = true;
        self.warm_up_endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Load a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// `~/.config/funkwhale/config.json` (platform config dir).
    pub fn default_path() -> Result<PathBuf> {
        Ok(app_dir()?.join(CONFIG_FILE))
    }

    /// `~/.config/funkwhale/token.json` (platform config dir).
    pub fn default_token_path() -> Result<PathBuf> {
        Ok(app_dir()?.join(TOKEN_FILE))
    }

    /// Whether the login endpoint selects the OAuth strategy.
    pub fn is_oauth(&self) -> bool {
        self.login_endpoint.contains(OAUTH_MARKER)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Domain without trailing slashes.
    pub fn base_address(&self) -> &str {
        self.domain.trim_end_matches('/')
    }

    /// Absolute URL of the login/token endpoint.
    pub fn login_url(&self) -> String {
        self.resolve(&self.login_endpoint)
    }

    /// Absolute URL of the warm-up endpoint.
    pub fn warm_up_url(&self) -> String {
        self.resolve(self.warm_up_endpoint.as_deref().unwrap_or(&self.login_endpoint))
    }

    /// Absolute URL of the authorization endpoint.
    pub fn authorization_url(&self) -> String {
        self.resolve(self.authorization_endpoint.as_deref().unwrap_or("/authorize"))
    }

    /// Token file location, falling back to the default path.
    pub fn resolved_token_path(&self) -> Result<PathBuf> {
        match &self.token_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_token_path(),
        }
    }

    /// Resolve `endpoint` against the domain unless it is already absolute.
    fn resolve(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_owned()
        } else {
            format!("{}/{}", self.base_address(), endpoint.trim_start_matches('/'))
        }
    }

    /// Check the fields the chosen strategy needs.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.domain.is_empty() {
            return Err(FunkwhaleError::Config("domain is empty".into()));
        }
        if self.timeout_ms == 0 {
            return Err(FunkwhaleError::Config("timeout must be greater than zero".into()));
        }
        if self.is_oauth() {
            if self.client_id.as_deref().is_none_or(str::is_empty) {
                return Err(FunkwhaleError::Config("OAuth login requires client_id".into()));
            }
        } else if self.username.is_none() {
            return Err(FunkwhaleError::Config("basic login requires username".into()));
        }
        Ok(())
    }
}

fn app_dir() -> Result<PathBuf> {
    let config = dirs::config_dir()
        .ok_or_else(|| FunkwhaleError::Config("cannot determine config directory".into()))?;
    Ok(config.join(APP_DIR))
}
