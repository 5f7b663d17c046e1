//! High-level Funkwhale client.
//!
//! [`FunkwhaleClient`] wraps a [`Session`] and turns endpoint-specific
//! arguments into [`Session::call`] invocations. Resource methods live in
//! separate modules (`artists`, `albums`, `tracks`, `licenses`, `favorites`,
//! `listen`) as `impl FunkwhaleClient` blocks.
//!
//! Only arguments that are set become query parameters; `None` is never sent.
//! JSON endpoints return the parsed body as [`serde_json::Value`], the audio
//! endpoint returns the raw [`Response`].

use crate::config::SessionConfig;
use crate::error::{FunkwhaleError, Result};
use crate::session::{CallOptions, Session};
use reqwest::Method;
use reqwest::blocking::Response;
use serde_json::Value;

/// Blocking client for the Funkwhale REST API.
#[derive(Debug)]
pub struct FunkwhaleClient {
    session: Session,
}

impl FunkwhaleClient {
    /// Connect with `config`.
    ///
    /// Fails with [`FunkwhaleError::InvalidToken`] if an OAuth session has no
    /// usable token yet; authorize through [`Session`] first in that case.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        Ok(Self {
            session: Session::connect(config)?,
        })
    }

    /// Wrap an already established session.
    pub fn with_session(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// `GET` a JSON endpoint.
    pub fn get_json(&mut self, endpoint: &str, params: Params) -> Result<Value> {
        let resp = self.session.call(
            endpoint,
            Method::GET,
            CallOptions::new().params(params.into_vec()),
        )?;
        parse_body(resp)
    }

    /// `POST` a JSON body to an endpoint, returning the JSON answer
    /// (`Value::Null` for empty bodies such as `204 No Content`).
    pub fn post_json(&mut self, endpoint: &str, data: Value) -> Result<Value> {
        let resp = self
            .session
            .call(endpoint, Method::POST, CallOptions::new().data(data))?;
        parse_body(resp)
    }

    /// `GET` an endpoint and hand back the raw response (binary streams).
    pub fn get_raw(&mut self, endpoint: &str, params: Params) -> Result<Response> {
        self.session.call(
            endpoint,
            Method::GET,
            CallOptions::new().params(params.into_vec()),
        )
    }
}

fn parse_body(resp: Response) -> Result<Value> {
    let text = resp.text()?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Query parameters built from optional arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key=value` when `value` is set.
    #[must_use]
    pub fn opt<T: ToString>(mut self, key: &str, value: Option<T>) -> Self {
        if let Some(v) = value {
            self.0.push((key.to_owned(), v.to_string()));
        }
        self
    }

    /// Add `key=value` unconditionally.
    #[must_use]
    pub fn set<T: ToString>(mut self, key: &str, value: T) -> Self {
        self.0.push((key.to_owned(), value.to_string()));
        self
    }

    pub fn into_vec(self) -> Vec<(String, String)> {
        self.0
    }
}

/// Accept an ordering field, optionally prefixed with `-` for descending.
pub(crate) fn check_ordering(value: Option<&str>, accepted: &'static [&'static str]) -> Result<()> {
    let Some(value) = value else { return Ok(()) };
    let field = value.strip_prefix('-').unwrap_or(value);
    if accepted.contains(&field) {
        Ok(())
    } else {
        Err(FunkwhaleError::Validation {
            field: "ordering",
            value: value.to_owned(),
            accepted,
        })
    }
}

/// Accept one of a fixed set of values.
pub(crate) fn check_choice(
    field: &'static str,
    value: Option<&str>,
    accepted: &'static [&'static str],
) -> Result<()> {
    match value {
        Some(v) if !accepted.contains(&v) => Err(FunkwhaleError::Validation {
            field,
            value: v.to_owned(),
            accepted,
        }),
        _ => Ok(()),
    }
}
