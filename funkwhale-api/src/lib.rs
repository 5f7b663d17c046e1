//! Funkwhale REST API client library.
//!
//! Provides authenticated, blocking access to a Funkwhale instance's
//! `/api/v1/` endpoints: artists, albums, tracks, licenses, favorites and
//! audio streaming.
//!
//! # Authentication
//!
//! Two strategies, chosen by the login endpoint:
//!
//! - **OAuth2 authorization code**: the login endpoint contains `oauth`
//!   (e.g. `/api/v1/oauth/token/`). The token is persisted to a JSON file
//!   (default `~/.config/funkwhale/token.json`) and refreshed automatically
//!   once it has been expired for more than a minute.
//! - **Basic**: any other login endpoint. `username`/`password` are sent as
//!   HTTP basic auth with every request. No refresh.
//!
//! ```no_run
//! use funkwhale_api::{FunkwhaleClient, Session, SessionConfig, SessionState};
//!
//! let config = SessionConfig::oauth(
//!     "https://demo.funkwhale.audio",
//!     "/api/v1/oauth/token/",
//!     "CLIENT_ID",
//!     "CLIENT_SECRET",
//!     "urn:ietf:wg:oauth:2.0:oob",
//! )
//! .with_scopes(["read", "write"]);
//!
//! let mut session = Session::new(&config).unwrap();
//! if session.state() == SessionState::OAuthNeedsAuth {
//!     println!("Visit {}", session.authorization_url().unwrap());
//!     session.establish_authorization_code("CODE_FROM_BROWSER").unwrap();
//! }
//!
//! let mut client = FunkwhaleClient::with_session(session);
//! let artists = client.artists(&Default::default()).unwrap();
//! ```
//!
//! # API endpoint mapping
//!
//! | Method                                   | Endpoint                        |
//! |------------------------------------------|---------------------------------|
//! | [`FunkwhaleClient::artists`]             | `GET /artists/`                 |
//! | [`FunkwhaleClient::artist`]              | `GET /artists/{id}/`            |
//! | [`FunkwhaleClient::artist_libraries`]    | `GET /artists/{id}/libraries/`  |
//! | [`FunkwhaleClient::albums`]              | `GET /albums/`                  |
//! | [`FunkwhaleClient::album`]               | `GET /albums/{id}/`             |
//! | [`FunkwhaleClient::album_libraries`]     | `GET /albums/{id}/libraries/`   |
//! | [`FunkwhaleClient::tracks`]              | `GET /tracks/`                  |
//! | [`FunkwhaleClient::track`]               | `GET /tracks/{id}/`             |
//! | [`FunkwhaleClient::track_libraries`]     | `GET /tracks/{id}/libraries/`   |
//! | [`FunkwhaleClient::licenses`]            | `GET /licenses/`                |
//! | [`FunkwhaleClient::license`]             | `GET /licenses/{code}/`         |
//! | [`FunkwhaleClient::favorite_tracks`]     | `GET /favorites/tracks/`        |
//! | [`FunkwhaleClient::add_favorite`]        | `POST /favorites/tracks/`       |
//! | [`FunkwhaleClient::remove_favorite`]     | `POST /favorites/tracks/remove/`|
//! | [`FunkwhaleClient::listen`]              | `GET /listen/{uuid}/` (raw)     |

mod albums;
mod artists;
pub mod client;
pub mod config;
pub mod error;
mod favorites;
mod licenses;
mod listen;
pub mod oauth;
pub mod session;
pub mod storage;
pub mod token;
mod tracks;
pub mod types;

pub use client::FunkwhaleClient;
pub use config::SessionConfig;
pub use error::{FunkwhaleError, Result};
pub use reqwest::Method;
pub use reqwest::blocking::Response;
pub use session::{CallOptions, Session, SessionState};
pub use token::OAuthToken;
