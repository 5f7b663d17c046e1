//! Track endpoints.
//!
//! ## `tracks`: `GET /api/v1/tracks/`
//!
//! Query: `q`, `artist`, `album`, `favorites`, `license`, `ordering`,
//! `playable`, `page`, `page_size`.
//!
//! Each result carries a `listen_url` (`/api/v1/listen/{uuid}/`) and the
//! track `uuid` needed by [`FunkwhaleClient::listen`].
//!
//! ```json
//! {
//!   "count": 2,
//!   "results": [{
//!     "id": 7, "uuid": "a3c4...", "title": "Sinnerman",
//!     "artist": { "id": 42, "name": "Nina Simone" },
//!     "album": { "id": 3, "title": "Pastel Blues" },
//!     "listen_url": "/api/v1/listen/a3c4.../"
//!   }]
//! }
//! ```

use crate::client::{FunkwhaleClient, Params, check_ordering};
use crate::error::Result;
use crate::types::{TRACK_ORDERING, TrackQuery};
use serde_json::Value;

impl FunkwhaleClient {
    /// List tracks.
    ///
    /// # Errors
    ///
    /// - [`FunkwhaleError::Validation`](crate::FunkwhaleError::Validation):
    ///   `ordering` is not one of [`TRACK_ORDERING`]
    pub fn tracks(&mut self, query: &TrackQuery) -> Result<Value> {
        check_ordering(query.ordering.as_deref(), TRACK_ORDERING)?;
        let params = Params::new()
            .opt("q", query.q.as_deref())
            .opt("artist", query.artist)
            .opt("album", query.album)
            .opt("favorites", query.favorites)
            .opt("license", query.license.as_deref())
            .opt("ordering", query.ordering.as_deref())
            .opt("playable", query.playable)
            .opt("page", query.page)
            .opt("page_size", query.page_size);
        self.get_json("tracks/", params)
    }

    /// Retrieve one track.
    pub fn track(&mut self, id: u64, refresh: bool) -> Result<Value> {
        self.get_json(&format!("tracks/{id}/"), Params::new().set("refresh", refresh))
    }

    /// Libraries containing this track.
    pub fn track_libraries(
        &mut self,
        id: u64,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Value> {
        let params = Params::new().opt("page", page).opt("page_size", page_size);
        self.get_json(&format!("tracks/{id}/libraries/"), params)
    }
}
