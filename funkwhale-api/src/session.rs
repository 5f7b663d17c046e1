//! Authenticated session: strategy selection, token lifecycle and the
//! single `call` primitive every resource method goes through.
//!
//! # Strategies
//!
//! The login endpoint decides once, at construction, how requests are
//! authenticated:
//!
//! | Login endpoint contains `oauth` | Strategy | Credential                       |
//! |---------------------------------|----------|----------------------------------|
//! | no                              | Basic    | `username:password` basic auth   |
//! | yes                             | OAuth    | `Authorization: <type> <token>`  |
//!
//! # State machine
//!
//! ```text
//!                 ┌── basic ──────────────▶ BasicReady
//! Uninitialized ──┤
//!                 └── oauth ─┬ token file ─▶ OAuthReady ◀─┐
//!                            └ no file ────▶ OAuthNeedsAuth ┘ establish_authorization_code
//!
//! OAuthReady ── refresh rejected (invalid_scope) ──▶ OAuthNeedsAuth
//! ```
//!
//! Basic sessions never refresh. OAuth sessions refresh at most once per
//! `call`, once `expires_at` lies more than 60 seconds in the past, and
//! persist every new token to the token file before using it.
//!
//! A `Session` is not meant to be shared between threads without external
//! locking: the expiry check and the request that follows are not atomic.

use crate::config::SessionConfig;
use crate::error::{FunkwhaleError, Result};
use crate::oauth::{INVALID_SCOPE, OAuthClient, parse_redirect};
use crate::storage;
use crate::token::OAuthToken;
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Construction has not finished.
    Uninitialized,
    /// Basic-auth session, ready for calls. Terminal.
    BasicReady,
    /// OAuth session without a usable token; the user must authorize.
    OAuthNeedsAuth,
    /// OAuth session holding a token.
    OAuthReady,
}

/// Optional pieces of a [`Session::call`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Query-string parameters.
    pub params: Vec<(String, String)>,
    /// JSON request body.
    pub data: Option<Value>,
    /// Explicit headers. When set on an OAuth session, no `Authorization`
    /// header is synthesized.
    pub headers: Option<HeaderMap>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn params(mut self, params: Vec<(String, String)>) -> Self {
        self.params.extend(params);
        self
    }

    #[must_use]
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }
}

enum Strategy {
    Basic(BasicAuth),
    OAuth(OAuthState),
}

struct BasicAuth {
    username: String,
    password: Option<String>,
}

struct OAuthState {
    client: OAuthClient,
    authorization_url: String,
    /// Anti-forgery value embedded in `authorization_url`.
    state: String,
    token_url: String,
    token_path: PathBuf,
    token: Option<OAuthToken>,
    /// Last authorization code the token endpoint answered for.
    consumed_code: Option<String>,
}

impl OAuthState {
    fn invalid_token(&self) -> FunkwhaleError {
        FunkwhaleError::InvalidToken {
            authorization_url: self.authorization_url.clone(),
        }
    }

    /// Persist a new credential, then make it the live one. A failed write
    /// leaves the previous credential in place.
    fn install(&mut self, token: OAuthToken) -> Result<()> {
        storage::write(&self.token_path, &token)?;
        info!(expires_at = token.expires_at, "access token stored");
        self.token = Some(token);
        Ok(())
    }

    /// Drop the credential; the user has to authorize again.
    fn revoke(&mut self, session_state: &mut SessionState) -> FunkwhaleError {
        self.token = None;
        *session_state = SessionState::OAuthNeedsAuth;
        self.invalid_token()
    }

    /// Run one refresh with the stored refresh token.
    fn refresh(&mut self, http: &Client, session_state: &mut SessionState) -> Result<()> {
        let Some(refresh_token) = self.token.as_ref().and_then(|t| t.refresh_token.clone()) else {
            warn!("no refresh token available, authorization required");
            return Err(self.revoke(session_state));
        };
        match self.client.refresh_token(http, &self.token_url, &refresh_token) {
            Ok(token) => {
                self.install(token)?;
                *session_state = SessionState::OAuthReady;
                Ok(())
            }
            Err(FunkwhaleError::OAuth { error, .. }) if error == INVALID_SCOPE => {
                warn!("refresh rejected for invalid scope, authorization required");
                Err(self.revoke(session_state))
            }
            Err(e) => Err(e),
        }
    }
}

/// An authenticated connection to one Funkwhale instance.
pub struct Session {
    http: Client,
    base_address: String,
    strategy: Strategy,
    state: SessionState,
}

impl Session {
    /// Build a session, restoring a persisted OAuth token if there is one.
    ///
    /// Without a persisted token (or when restoring it needs a fresh
    /// authorization) the session is returned in
    /// [`SessionState::OAuthNeedsAuth`]; finish with
    /// [`establish_authorization_code`](Self::establish_authorization_code).
    pub fn new(config: &SessionConfig) -> Result<Self> {
        config.validate()?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()?;

        if config.is_oauth() {
            Self::new_oauth(config, http)
        } else {
            Self::new_basic(config, http)
        }
    }

    /// Like [`new`](Self::new), but fails with
    /// [`FunkwhaleError::InvalidToken`] when the user still has to authorize.
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let session = Self::new(config)?;
        if let Strategy::OAuth(oauth) = &session.strategy {
            if session.state == SessionState::OAuthNeedsAuth {
                return Err(oauth.invalid_token());
            }
        }
        Ok(session)
    }

    fn new_basic(config: &SessionConfig, http: Client) -> Result<Self> {
        let mut session = Self {
            http,
            base_address: config.base_address().to_owned(),
            strategy: Strategy::Basic(BasicAuth {
                username: config.username.clone().unwrap_or_default(),
                password: config.password.clone(),
            }),
            state: SessionState::Uninitialized,
        };
        info!(domain = %session.base_address, "using basic authentication");

        if config.warm_up {
            session.warm_up(&config.warm_up_url())?;
        }
        session.state = SessionState::BasicReady;
        Ok(session)
    }

    fn new_oauth(config: &SessionConfig, http: Client) -> Result<Self> {
        let client = OAuthClient::new(
            config.client_id.clone().unwrap_or_default(),
            config.client_secret.clone(),
            config.redirect_uri.clone(),
            config.scopes.clone(),
        );
        let (authorization_url, state) = client.authorization_url(&config.authorization_url())?;
        let token_path = config.resolved_token_path()?;
        info!(domain = %config.base_address(), token_path = %token_path.display(), "using OAuth authentication");

        let token = match storage::read(&token_path) {
            Ok(raw) => Some(OAuthToken::from_json(&raw)?),
            Err(FunkwhaleError::NotFound(_)) => {
                info!("no stored token, authorization required");
                None
            }
            Err(e) => return Err(e),
        };
        let restored = token.is_some();

        let mut session = Self {
            http,
            base_address: config.base_address().to_owned(),
            strategy: Strategy::OAuth(OAuthState {
                client,
                authorization_url,
                state,
                token_url: config.login_url(),
                token_path,
                token,
                consumed_code: None,
            }),
            state: SessionState::Uninitialized,
        };

        if !restored {
            session.state = SessionState::OAuthNeedsAuth;
            return Ok(session);
        }

        session.state = SessionState::OAuthReady;
        match session.ensure_fresh() {
            Ok(()) => Ok(session),
            Err(e) if e.is_invalid_token() => Ok(session),
            Err(e) => Err(e),
        }
    }

    fn warm_up(&self, url: &str) -> Result<()> {
        let Strategy::Basic(basic) = &self.strategy else {
            return Ok(());
        };
        debug!(url, "warm-up request");
        let resp = self
            .http
            .get(url)
            .basic_auth(&basic.username, basic.password.as_ref())
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(FunkwhaleError::status(status.as_u16(), &body));
        }
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_oauth(&self) -> bool {
        matches!(self.strategy, Strategy::OAuth(_))
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    /// URL the user visits to grant access (OAuth only).
    pub fn authorization_url(&self) -> Option<&str> {
        match &self.strategy {
            Strategy::OAuth(oauth) => Some(&oauth.authorization_url),
            Strategy::Basic(_) => None,
        }
    }

    /// Anti-forgery `state` embedded in the authorization URL (OAuth only).
    pub fn oauth_state(&self) -> Option<&str> {
        match &self.strategy {
            Strategy::OAuth(oauth) => Some(&oauth.state),
            Strategy::Basic(_) => None,
        }
    }

    /// The live OAuth token, if one is held.
    pub fn token(&self) -> Option<&OAuthToken> {
        match &self.strategy {
            Strategy::OAuth(oauth) => oauth.token.as_ref(),
            Strategy::Basic(_) => None,
        }
    }

    /// Where the OAuth token is persisted.
    pub fn token_path(&self) -> Option<&Path> {
        match &self.strategy {
            Strategy::OAuth(oauth) => Some(&oauth.token_path),
            Strategy::Basic(_) => None,
        }
    }

    /// Exchange a user-provided authorization code for a token, persist it
    /// and move to [`SessionState::OAuthReady`].
    ///
    /// # Errors
    ///
    /// - [`FunkwhaleError::NotOAuth`]: basic session
    /// - [`FunkwhaleError::InvalidToken`]: `code` is empty or the token
    ///   endpoint already answered for it on this session
    /// - [`FunkwhaleError::OAuth`]: the token endpoint rejected the code
    pub fn establish_authorization_code(&mut self, code: &str) -> Result<()> {
        let Strategy::OAuth(oauth) = &mut self.strategy else {
            return Err(FunkwhaleError::NotOAuth);
        };
        let code = code.trim();
        if code.is_empty() || oauth.consumed_code.as_deref() == Some(code) {
            warn!("authorization code missing or already used");
            return Err(oauth.invalid_token());
        }

        let fetched = oauth.client.fetch_token(&self.http, &oauth.token_url, code);
        // A code the server never saw can be retried.
        if !matches!(fetched, Err(FunkwhaleError::Http(_))) {
            oauth.consumed_code = Some(code.to_owned());
        }
        oauth.install(fetched?)?;
        self.state = SessionState::OAuthReady;
        info!("authorization completed");
        Ok(())
    }

    /// Complete authorization from the redirect URL the browser landed on,
    /// checking its `state` against this session's.
    pub fn authorize_from_redirect(&mut self, redirect_url: &str) -> Result<()> {
        let Strategy::OAuth(oauth) = &self.strategy else {
            return Err(FunkwhaleError::NotOAuth);
        };
        let params = parse_redirect(redirect_url)?;
        if params.state.as_deref() != Some(oauth.state.as_str()) {
            warn!("authorization redirect state does not match");
            return Err(FunkwhaleError::StateMismatch);
        }
        self.establish_authorization_code(&params.code)
    }

    /// Refresh the OAuth token once it is more than 60 seconds past
    /// `expires_at`.
    ///
    /// No-op on basic sessions.
    ///
    /// # Errors
    ///
    /// - [`FunkwhaleError::InvalidToken`]: no token held, or the refresh was
    ///   rejected for invalid scope (the session then needs authorization)
    /// - any transport or token-endpoint error from the refresh itself
    pub fn ensure_fresh(&mut self) -> Result<()> {
        let Strategy::OAuth(oauth) = &mut self.strategy else {
            return Ok(());
        };
        let Some(token) = &oauth.token else {
            return Err(oauth.invalid_token());
        };
        if !token.is_expired() {
            return Ok(());
        }
        debug!(expires_at = token.expires_at, "access token expired");
        oauth.refresh(&self.http, &mut self.state)
    }

    /// Refresh the OAuth token regardless of its expiry, e.g. after a 401.
    ///
    /// No-op on basic sessions.
    pub fn force_refresh(&mut self) -> Result<()> {
        let Strategy::OAuth(oauth) = &mut self.strategy else {
            debug!("basic session, nothing to refresh");
            return Ok(());
        };
        oauth.refresh(&self.http, &mut self.state)
    }

    /// Issue an authenticated request to `<base_address>/api/v1/<endpoint>`.
    ///
    /// Returns the raw response on any 2xx status; bodies are not parsed.
    ///
    /// # Errors
    ///
    /// - [`FunkwhaleError::InvalidToken`]: OAuth session without a usable
    ///   token, or the server answered 401
    /// - [`FunkwhaleError::Status`]: any other non-2xx status
    /// - [`FunkwhaleError::Http`]: transport failure
    pub fn call(&mut self, endpoint: &str, method: Method, options: CallOptions) -> Result<Response> {
        self.ensure_fresh()?;

        let endpoint = endpoint.strip_prefix('/').unwrap_or(endpoint);
        let url = format!("{}/api/v1/{endpoint}", self.base_address);
        let CallOptions { params, data, headers } = options;

        let mut req = self.http.request(method.clone(), &url);
        if !params.is_empty() {
            req = req.query(&params);
        }
        if let Some(data) = &data {
            req = req.json(data);
        }
        match &self.strategy {
            Strategy::Basic(basic) => {
                req = req.basic_auth(&basic.username, basic.password.as_ref());
            }
            Strategy::OAuth(oauth) => {
                if headers.is_none() {
                    let token = oauth.token.as_ref().ok_or_else(|| oauth.invalid_token())?;
                    req = req.header(AUTHORIZATION, token.authorization_header());
                }
            }
        }
        if let Some(headers) = headers {
            req = req.headers(headers);
        }

        debug!(%method, %url, "calling API");
        let resp = req.send()?;
        let status = resp.status();

        if let Strategy::OAuth(oauth) = &self.strategy {
            if status == StatusCode::UNAUTHORIZED {
                warn!(%url, "server rejected access token");
                return Err(oauth.invalid_token());
            }
        }
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(FunkwhaleError::status(status.as_u16(), &body));
        }
        Ok(resp)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match &self.strategy {
            Strategy::Basic(_) => "basic",
            Strategy::OAuth(_) => "oauth",
        };
        f.debug_struct("Session")
            .field("base_address", &self.base_address)
            .field("strategy", &strategy)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
