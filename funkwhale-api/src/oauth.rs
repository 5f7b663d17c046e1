//! OAuth2 authorization-code client.
//!
//! # Flow
//!
//! 1. [`OAuthClient::authorization_url`] builds the URL the user opens in a
//!    browser, with a random anti-forgery `state`:
//!    `GET /authorize?response_type=code&client_id=..&redirect_uri=..&scope=read+write&state=..`
//! 2. The instance redirects back to `redirect_uri?code=..&state=..`.
//! 3. [`OAuthClient::fetch_token`] exchanges the code at the token endpoint:
//!    `POST grant_type=authorization_code&code=..&redirect_uri=..&client_id=..&client_secret=..`
//! 4. [`OAuthClient::refresh_token`] renews the access token later:
//!    `POST grant_type=refresh_token&refresh_token=..&client_id=..&client_secret=..`
//!
//! Token endpoint responses follow RFC 6749 §5:
//!
//! ```json
//! { "access_token": "..", "token_type": "Bearer", "expires_in": 36000,
//!   "refresh_token": "..", "scope": "read write" }
//! ```
//!
//! or, on failure, `{ "error": "invalid_scope", "error_description": ".." }`.

use crate::error::{FunkwhaleError, Result};
use crate::token::{self, OAuthToken, TokenErrorResponse, TokenResponse};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use tracing::{debug, warn};
use url::Url;

/// OAuth2 error code for a grant whose scope is no longer acceptable.
pub const INVALID_SCOPE: &str = "invalid_scope";

/// OAuth2 client scoped to one application registration.
#[derive(Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl OAuthClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            scopes,
        }
    }

    /// Build the authorization URL for `endpoint` with a fresh random state.
    ///
    /// Returns `(url, state)`.
    pub fn authorization_url(&self, endpoint: &str) -> Result<(String, String)> {
        let state = generate_state();
        let url = self.authorization_url_with_state(endpoint, &state)?;
        Ok((url, state))
    }

    /// Build the authorization URL for `endpoint` with the given state.
    pub fn authorization_url_with_state(&self, endpoint: &str, state: &str) -> Result<String> {
        let scope = self.scopes.join(" ");
        let url = Url::parse_with_params(
            endpoint,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    /// Exchange an authorization code for a token.
    pub fn fetch_token(&self, http: &Client, token_url: &str, code: &str) -> Result<OAuthToken> {
        debug!(url = %token_url, "exchanging authorization code");
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        self.push_client_credentials(&mut form);
        self.token_request(http, token_url, &form)
    }

    /// Obtain a new access token with `refresh_token`.
    ///
    /// If the server does not rotate the refresh token, the one passed in is
    /// kept on the returned credential.
    pub fn refresh_token(
        &self,
        http: &Client,
        token_url: &str,
        refresh_token: &str,
    ) -> Result<OAuthToken> {
        debug!(url = %token_url, "refreshing access token");
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.push_client_credentials(&mut form);
        let mut token = self.token_request(http, token_url, &form)?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_owned());
        }
        Ok(token)
    }

    fn push_client_credentials<'a>(&'a self, form: &mut Vec<(&'static str, &'a str)>) {
        form.push(("client_id", self.client_id.as_str()));
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
    }

    fn token_request(
        &self,
        http: &Client,
        token_url: &str,
        form: &[(&str, &str)],
    ) -> Result<OAuthToken> {
        let resp = http
            .post(token_url)
            .header(ACCEPT, "application/json")
            .form(form)
            .send()?;
        let status = resp.status();
        let body = resp.text()?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => {
                    warn!(status = status.as_u16(), error = %err.error, "token endpoint rejected grant");
                    FunkwhaleError::OAuth {
                        error: err.error,
                        description: err.error_description,
                    }
                }
                Err(_) => FunkwhaleError::status(status.as_u16(), &body),
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        let token = parsed.into_token(token::now())?;
        if !token.covers(&self.scopes) {
            warn!(
                requested = %self.scopes.join(" "),
                granted = token.scope().unwrap_or_default(),
                "granted scope does not cover requested scope"
            );
            return Err(FunkwhaleError::OAuth {
                error: INVALID_SCOPE.into(),
                description: Some("granted scope no longer covers the requested scope".into()),
            });
        }
        Ok(token)
    }
}

/// Parameters extracted from the redirect the browser landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectParams {
    pub code: String,
    pub state: Option<String>,
}

/// Extract `code` and `state` from an authorization redirect URL.
///
/// An `error` parameter (e.g. `access_denied`) is reported as
/// [`FunkwhaleError::OAuth`].
pub fn parse_redirect(redirect: &str) -> Result<RedirectParams> {
    let url = Url::parse(redirect)?;
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            "error" => error = Some(v.into_owned()),
            "error_description" => description = Some(v.into_owned()),
            _ => {}
        }
    }
    if let Some(error) = error {
        return Err(FunkwhaleError::OAuth { error, description });
    }
    let code = code.ok_or_else(|| FunkwhaleError::OAuth {
        error: "invalid_request".into(),
        description: Some("redirect URL has no code parameter".into()),
    })?;
    Ok(RedirectParams { code, state })
}

/// Generate a random anti-forgery `state` value.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
