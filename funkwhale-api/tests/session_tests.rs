//! Session behavior against a mock Funkwhale server.
//!
//! Token endpoint and resource endpoints are served by `mockito`; token files
//! live in temporary directories.

use funkwhale_api::token::now;
use funkwhale_api::{CallOptions, FunkwhaleError, Method, Session, SessionConfig, SessionState};
use mockito::{Matcher, Server, ServerGuard};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::path::Path;

const TOKEN_PATH: &str = "/api/v1/oauth/token/";

fn oauth_config(server: &ServerGuard, dir: &Path) -> SessionConfig {
    SessionConfig::oauth(server.url(), TOKEN_PATH, "client-id", "client-secret", "urn:ietf:wg:oauth:2.0:oob")
        .with_scopes(["read"])
        .with_token_path(dir.join("token.json"))
}

fn persist_token(dir: &Path, access: &str, refresh: Option<&str>, expires_at: f64) {
    let mut record = json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_at": expires_at,
    });
    if let Some(r) = refresh {
        record["refresh_token"] = json!(r);
    }
    std::fs::write(dir.join("token.json"), record.to_string()).unwrap();
}

fn read_token(dir: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(dir.join("token.json")).unwrap()).unwrap()
}

fn token_body(access: &str, refresh: &str, expires_in: i64) -> String {
    json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": expires_in,
        "refresh_token": refresh,
        "scope": "read",
    })
    .to_string()
}

// =============================================================================
// Construction
// =============================================================================

mod construction {
    use super::*;

    #[test]
    fn missing_token_file_raises_invalid_token_with_authorization_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::oauth(
            "https://example.org",
            "https://example.org/oauth/token",
            "client-id",
            "client-secret",
            "urn:ietf:wg:oauth:2.0:oob",
        )
        .with_token_path(dir.path().join("token.json"));

        match Session::connect(&config) {
            Err(FunkwhaleError::InvalidToken { authorization_url }) => {
                assert!(authorization_url.starts_with("https://example.org/authorize?"));
                assert!(authorization_url.contains("client_id=client-id"));
                assert!(authorization_url.contains("response_type=code"));
            }
            other => panic!("expected InvalidToken, got {other:?}"),
        }
        assert!(!dir.path().join("token.json").exists());
    }

    #[test]
    fn expired_persisted_token_is_refreshed_once_and_rewritten() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        let stale_at = now() - 120.0;
        persist_token(dir.path(), "abc", Some("r1"), stale_at);

        let refresh = server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "r1".into()),
                Matcher::UrlEncoded("client_id".into(), "client-id".into()),
                Matcher::UrlEncoded("client_secret".into(), "client-secret".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_body("fresh", "r2", 3600))
            .expect(1)
            .create();

        let session = Session::connect(&oauth_config(&server, dir.path())).unwrap();
        refresh.assert();
        assert_eq!(session.state(), SessionState::OAuthReady);

        let stored = read_token(dir.path());
        assert_eq!(stored["access_token"], "fresh");
        assert_eq!(stored["refresh_token"], "r2");
        assert!(stored["expires_at"].as_f64().unwrap() > stale_at);
    }

    #[test]
    fn valid_persisted_token_is_used_without_refresh() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        persist_token(dir.path(), "abc", Some("r1"), now() + 3600.0);
        let refresh = server.mock("POST", TOKEN_PATH).expect(0).create();

        let session = Session::connect(&oauth_config(&server, dir.path())).unwrap();
        refresh.assert();
        assert_eq!(session.state(), SessionState::OAuthReady);
        assert_eq!(session.token().unwrap().access_token, "abc");
    }

    #[test]
    fn token_inside_grace_period_is_not_refreshed() {
        for offset in [30.0, -30.0] {
            let mut server = Server::new();
            let dir = tempfile::tempdir().unwrap();
            persist_token(dir.path(), "abc", Some("r1"), now() + offset);
            let refresh = server.mock("POST", TOKEN_PATH).expect(0).create();

            let session = Session::connect(&oauth_config(&server, dir.path())).unwrap();
            refresh.assert();
            assert_eq!(session.token().unwrap().access_token, "abc");
        }
    }

    #[test]
    fn basic_warm_up_uses_configured_endpoint() {
        let mut server = Server::new();
        let login = server.mock("GET", "/api/v1/token/").expect(0).create();
        let me = server
            .mock("GET", "/api/v1/users/me/")
            .match_header("authorization", "Basic YWxpY2U6cHc=")
            .with_status(200)
            .expect(1)
            .create();

        let config = SessionConfig::basic(server.url(), "/api/v1/token/", "alice", "pw")
            .with_warm_up_endpoint("/api/v1/users/me/");
        Session::new(&config).unwrap();
        login.assert();
        me.assert();
    }

    #[test]
    fn basic_warm_up_hits_login_endpoint() {
        let mut server = Server::new();
        let warm = server
            .mock("GET", "/api/v1/token/")
            .match_header("authorization", "Basic YWxpY2U6cHc=")
            .with_status(200)
            .expect(1)
            .create();

        let config =
            SessionConfig::basic(server.url(), "/api/v1/token/", "alice", "pw").with_warm_up(true);
        let session = Session::new(&config).unwrap();
        warm.assert();
        assert_eq!(session.state(), SessionState::BasicReady);
    }

    #[test]
    fn basic_warm_up_failure_is_a_status_error() {
        let mut server = Server::new();
        server.mock("GET", "/api/v1/token/").with_status(403).create();

        let config =
            SessionConfig::basic(server.url(), "/api/v1/token/", "alice", "pw").with_warm_up(true);
        assert!(matches!(
            Session::new(&config),
            Err(FunkwhaleError::Status { status: 403, .. })
        ));
    }
}

// =============================================================================
// Authorization code exchange
// =============================================================================

mod authorization {
    use super::*;

    #[test]
    fn code_exchange_persists_token_and_rejects_reuse() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        let exchange = server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "c0de".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "urn:ietf:wg:oauth:2.0:oob".into()),
                Matcher::UrlEncoded("client_id".into(), "client-id".into()),
            ]))
            .with_status(200)
            .with_body(token_body("first", "r1", 3600))
            .expect(1)
            .create();

        let mut session = Session::new(&oauth_config(&server, dir.path())).unwrap();
        assert_eq!(session.state(), SessionState::OAuthNeedsAuth);

        session.establish_authorization_code("c0de").unwrap();
        assert_eq!(session.state(), SessionState::OAuthReady);
        assert_eq!(read_token(dir.path())["access_token"], "first");

        let again = session.establish_authorization_code("c0de").unwrap_err();
        assert!(again.is_invalid_token());
        exchange.assert();
    }

    #[test]
    fn rejected_code_reports_oauth_error() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        server
            .mock("POST", TOKEN_PATH)
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"code expired"}"#)
            .create();

        let mut session = Session::new(&oauth_config(&server, dir.path())).unwrap();
        let err = session.establish_authorization_code("old").unwrap_err();
        assert!(matches!(err, FunkwhaleError::OAuth { ref error, .. } if error == "invalid_grant"));
        assert_eq!(session.state(), SessionState::OAuthNeedsAuth);
        assert!(!dir.path().join("token.json").exists());

        // The server answered for this code, so it is spent.
        assert!(session.establish_authorization_code("old").unwrap_err().is_invalid_token());
    }

    #[test]
    fn failed_token_write_keeps_session_unauthorized() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        server
            .mock("POST", TOKEN_PATH)
            .with_status(200)
            .with_body(token_body("tok", "r1", 3600))
            .create();
        let artists = server.mock("GET", "/api/v1/artists/").expect(0).create();

        let mut session = Session::new(&oauth_config(&server, dir.path())).unwrap();
        // Occupy the token location with a non-empty directory.
        let occupied = dir.path().join("token.json");
        std::fs::create_dir(&occupied).unwrap();
        std::fs::write(occupied.join("keep"), "x").unwrap();

        let err = session.establish_authorization_code("c1").unwrap_err();
        assert!(matches!(err, FunkwhaleError::Io(_)));
        assert_eq!(session.state(), SessionState::OAuthNeedsAuth);
        assert!(session.token().is_none());
        assert!(session.call("artists/", Method::GET, CallOptions::new()).unwrap_err().is_invalid_token());
        artists.assert();
    }

    #[test]
    fn redirect_with_matching_state_completes_authorization() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::UrlEncoded("code".into(), "from-browser".into()))
            .with_status(200)
            .with_body(token_body("tok", "r1", 3600))
            .create();

        let mut session = Session::new(&oauth_config(&server, dir.path())).unwrap();
        let state = session.oauth_state().unwrap().to_owned();
        session
            .authorize_from_redirect(&format!("http://localhost:8000/callback?code=from-browser&state={state}"))
            .unwrap();
        assert_eq!(session.state(), SessionState::OAuthReady);
    }
}

// =============================================================================
// Refresh
// =============================================================================

mod refresh {
    use super::*;

    /// Session that went through a code exchange yielding a token already
    /// past the refresh margin.
    fn near_expiry_session(server: &mut ServerGuard, dir: &Path) -> Session {
        server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()))
            .with_status(200)
            .with_body(token_body("old", "r1", -120))
            .create();
        let mut session = Session::new(&oauth_config(server, dir)).unwrap();
        session.establish_authorization_code("c0de").unwrap();
        session
    }

    #[test]
    fn expired_token_refreshes_exactly_once_before_call() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        let mut session = near_expiry_session(&mut server, dir.path());

        let refresh = server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .with_status(200)
            .with_body(token_body("new", "r2", 3600))
            .expect(1)
            .create();
        let artists = server
            .mock("GET", "/api/v1/artists/")
            .match_header("authorization", "Bearer new")
            .with_status(200)
            .with_body(r#"{"count":0,"results":[]}"#)
            .expect(2)
            .create();

        session.call("/artists/", Method::GET, CallOptions::new()).unwrap();
        session.call("artists/", Method::GET, CallOptions::new()).unwrap();

        refresh.assert();
        artists.assert();
        assert_eq!(read_token(dir.path())["access_token"], "new");
    }

    #[test]
    fn refresh_keeps_refresh_token_when_not_rotated() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        let mut session = near_expiry_session(&mut server, dir.path());
        server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .with_status(200)
            .with_body(r#"{"access_token":"new","token_type":"Bearer","expires_in":3600}"#)
            .create();

        session.ensure_fresh().unwrap();
        assert_eq!(session.token().unwrap().refresh_token.as_deref(), Some("r1"));
        assert_eq!(read_token(dir.path())["refresh_token"], "r1");
    }

    #[test]
    fn invalid_scope_requires_new_authorization() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        let mut session = near_expiry_session(&mut server, dir.path());
        let refresh = server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .with_status(400)
            .with_body(r#"{"error":"invalid_scope"}"#)
            .expect(1)
            .create();
        let artists = server.mock("GET", "/api/v1/artists/").expect(0).create();

        let err = session.call("artists/", Method::GET, CallOptions::new()).unwrap_err();
        assert!(err.is_invalid_token());
        assert_eq!(session.state(), SessionState::OAuthNeedsAuth);

        // No silent retry: nothing works until a new code is exchanged.
        assert!(session.ensure_fresh().unwrap_err().is_invalid_token());
        assert!(session.call("artists/", Method::GET, CallOptions::new()).unwrap_err().is_invalid_token());
        refresh.assert();
        artists.assert();
    }

    #[test]
    fn narrowed_scope_on_refresh_requires_new_authorization() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        let config = oauth_config(&server, dir.path()).with_scopes(["read", "write"]);
        server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()))
            .with_status(200)
            .with_body(
                json!({"access_token":"old","token_type":"Bearer","expires_in":-120,"refresh_token":"r1","scope":"read write"})
                    .to_string(),
            )
            .create();
        server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .with_status(200)
            .with_body(token_body("new", "r2", 3600))
            .create();

        let mut session = Session::new(&config).unwrap();
        session.establish_authorization_code("c0de").unwrap();
        assert!(session.ensure_fresh().unwrap_err().is_invalid_token());
        assert_eq!(session.state(), SessionState::OAuthNeedsAuth);
    }

    #[test]
    fn other_refresh_failures_propagate_and_keep_state() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        let mut session = near_expiry_session(&mut server, dir.path());
        server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .with_status(503)
            .with_body("maintenance")
            .create();

        let err = session.ensure_fresh().unwrap_err();
        assert!(matches!(err, FunkwhaleError::Status { status: 503, .. }));
        assert_eq!(session.state(), SessionState::OAuthReady);
        assert!(session.token().is_some());
    }

    #[test]
    fn force_refresh_ignores_expiry() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        persist_token(dir.path(), "abc", Some("r1"), now() + 3600.0);
        let refresh = server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::UrlEncoded("refresh_token".into(), "r1".into()))
            .with_status(200)
            .with_body(token_body("forced", "r2", 3600))
            .expect(1)
            .create();

        let mut session = Session::connect(&oauth_config(&server, dir.path())).unwrap();
        session.force_refresh().unwrap();
        refresh.assert();
        assert_eq!(session.token().unwrap().access_token, "forced");
        assert_eq!(read_token(dir.path())["access_token"], "forced");
    }

    #[test]
    fn basic_session_never_refreshes() {
        let mut server = Server::new();
        let token = server.mock("POST", Matcher::Any).expect(0).create();
        let artists = server.mock("GET", "/api/v1/artists/").with_status(200).expect(2).create();

        let config = SessionConfig::basic(server.url(), "/api/v1/token/", "alice", "pw");
        let mut session = Session::new(&config).unwrap();
        session.call("artists/", Method::GET, CallOptions::new()).unwrap();
        session.force_refresh().unwrap();
        session.ensure_fresh().unwrap();
        session.call("artists/", Method::GET, CallOptions::new()).unwrap();

        token.assert();
        artists.assert();
        assert_eq!(session.state(), SessionState::BasicReady);
    }
}

// =============================================================================
// call
// =============================================================================

mod call {
    use super::*;

    fn ready_session(server: &ServerGuard, dir: &Path) -> Session {
        persist_token(dir, "abc", Some("r1"), now() + 3600.0);
        Session::connect(&oauth_config(server, dir)).unwrap()
    }

    #[test]
    fn basic_call_uses_basic_auth_and_api_prefix() {
        let mut server = Server::new();
        let artists = server
            .mock("GET", "/api/v1/artists/")
            .match_header("authorization", "Basic YWxpY2U6cHc=")
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create();

        let config = SessionConfig::basic(format!("{}/", server.url()), "/api/v1/token/", "alice", "pw");
        let mut session = Session::new(&config).unwrap();
        let resp = session.call("/artists/", Method::GET, CallOptions::new()).unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        artists.assert();
    }

    #[test]
    fn oauth_call_synthesizes_authorization_header() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        let albums = server
            .mock("GET", "/api/v1/albums/")
            .match_header("authorization", "Bearer abc")
            .match_query(Matcher::UrlEncoded("q".into(), "blue".into()))
            .with_status(200)
            .with_body(r#"{"results":[]}"#)
            .expect(1)
            .create();

        let mut session = ready_session(&server, dir.path());
        let resp = session
            .call("albums/", Method::GET, CallOptions::new().param("q", "blue"))
            .unwrap();
        assert_eq!(resp.text().unwrap(), r#"{"results":[]}"#);
        albums.assert();
    }

    #[test]
    fn explicit_headers_suppress_authorization() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        let m = server
            .mock("GET", "/api/v1/instance/nodeinfo/2.0/")
            .match_header("authorization", Matcher::Missing)
            .match_header("x-custom", "1")
            .with_status(200)
            .expect(1)
            .create();

        let mut session = ready_session(&server, dir.path());
        let mut headers = HeaderMap::new();
        headers.insert("x-custom", HeaderValue::from_static("1"));
        session
            .call("instance/nodeinfo/2.0/", Method::GET, CallOptions::new().headers(headers))
            .unwrap();
        m.assert();
    }

    #[test]
    fn json_body_is_sent() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        let m = server
            .mock("POST", "/api/v1/favorites/tracks/")
            .match_body(Matcher::Json(json!({ "track": 7 })))
            .with_status(201)
            .expect(1)
            .create();

        let mut session = ready_session(&server, dir.path());
        session
            .call("favorites/tracks/", Method::POST, CallOptions::new().data(json!({ "track": 7 })))
            .unwrap();
        m.assert();
    }

    #[test]
    fn unauthorized_is_invalid_token_not_status() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        server.mock("GET", "/api/v1/tracks/").with_status(401).create();

        let mut session = ready_session(&server, dir.path());
        let err = session.call("tracks/", Method::GET, CallOptions::new()).unwrap_err();
        match err {
            FunkwhaleError::InvalidToken { authorization_url } => {
                assert!(authorization_url.starts_with(&format!("{}/authorize?", server.url())));
            }
            other => panic!("expected InvalidToken, got {other:?}"),
        }
    }

    #[test]
    fn basic_unauthorized_is_a_status_error() {
        let mut server = Server::new();
        server.mock("GET", "/api/v1/tracks/").with_status(401).create();

        let config = SessionConfig::basic(server.url(), "/api/v1/token/", "alice", "wrong");
        let mut session = Session::new(&config).unwrap();
        assert!(matches!(
            session.call("tracks/", Method::GET, CallOptions::new()),
            Err(FunkwhaleError::Status { status: 401, .. })
        ));
    }

    #[test]
    fn other_failures_are_status_errors() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        server
            .mock("GET", "/api/v1/tracks/999/")
            .with_status(404)
            .with_body(r#"{"detail":"Not found."}"#)
            .create();

        let mut session = ready_session(&server, dir.path());
        match session.call("tracks/999/", Method::GET, CallOptions::new()) {
            Err(FunkwhaleError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("Not found."));
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn call_without_token_fails_before_any_request() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        let m = server.mock("GET", Matcher::Any).expect(0).create();

        let mut session = Session::new(&oauth_config(&server, dir.path())).unwrap();
        let err = session.call("artists/", Method::GET, CallOptions::new()).unwrap_err();
        assert!(err.is_invalid_token());
        m.assert();
    }
}

// =============================================================================
// Shared use
// =============================================================================

mod shared {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// Refresh-then-request is not atomic, so callers sharing a session must
    /// serialize whole calls. Under a mutex the refresh happens exactly once.
    #[test]
    fn mutex_serialized_callers_refresh_once() {
        let mut server = Server::new();
        let dir = tempfile::tempdir().unwrap();
        server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()))
            .with_status(200)
            .with_body(token_body("old", "r1", -120))
            .create();
        let refresh = server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .with_status(200)
            .with_body(token_body("new", "r2", 3600))
            .expect(1)
            .create();
        let tracks = server
            .mock("GET", "/api/v1/tracks/")
            .match_header("authorization", "Bearer new")
            .with_status(200)
            .expect(4)
            .create();

        let mut session = Session::new(&oauth_config(&server, dir.path())).unwrap();
        session.establish_authorization_code("c0de").unwrap();
        let session = Arc::new(Mutex::new(session));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    let mut guard = session.lock().unwrap();
                    guard.call("tracks/", Method::GET, CallOptions::new()).map(|r| r.status())
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap().unwrap().is_success());
        }

        refresh.assert();
        tracks.assert();
    }
}
