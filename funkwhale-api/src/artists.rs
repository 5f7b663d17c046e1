//! Artist endpoints.
//!
//! ## `artists`: `GET /api/v1/artists/`
//!
//! Query: `q`, `ordering`, `playable`, `page`, `page_size`.
//!
//! Response:
//! ```json
//! {
//!   "count": 1291,
//!   "next": "https://demo.funkwhale.audio/api/v1/artists/?page=2",
//!   "previous": null,
//!   "results": [{ "id": 42, "fid": "https://...", "name": "Nina Simone", "albums": [...] }]
//! }
//! ```
//!
//! ## `artist`: `GET /api/v1/artists/{id}/`
//!
//! ## `artist_libraries`: `GET /api/v1/artists/{id}/libraries/`

use crate::client::{FunkwhaleClient, Params, check_ordering};
use crate::error::Result;
use crate::types::{ARTIST_ORDERING, ArtistQuery};
use serde_json::Value;

impl FunkwhaleClient {
    /// List artists.
    ///
    /// # Errors
    ///
    /// - [`FunkwhaleError::Validation`](crate::FunkwhaleError::Validation):
    ///   `ordering` is not one of [`ARTIST_ORDERING`]
    pub fn artists(&mut self, query: &ArtistQuery) -> Result<Value> {
        check_ordering(query.ordering.as_deref(), ARTIST_ORDERING)?;
        let params = Params::new()
            .opt("q", query.q.as_deref())
            .opt("ordering", query.ordering.as_deref())
            .opt("playable", query.playable)
            .opt("page", query.page)
            .opt("page_size", query.page_size);
        self.get_json("artists/", params)
    }

    /// Retrieve one artist. `refresh` asks the server to re-fetch remote
    /// (federated) data first.
    pub fn artist(&mut self, id: u64, refresh: bool) -> Result<Value> {
        self.get_json(&format!("artists/{id}/"), Params::new().set("refresh", refresh))
    }

    /// Libraries containing work from this artist.
    pub fn artist_libraries(
        &mut self,
        id: u64,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Value> {
        let params = Params::new().opt("page", page).opt("page_size", page_size);
        self.get_json(&format!("artists/{id}/libraries/"), params)
    }
}
