//! Album endpoints: `GET /api/v1/albums/`, `/albums/{id}/`,
//! `/albums/{id}/libraries/`.

use crate::client::{FunkwhaleClient, Params, check_ordering};
use crate::error::Result;
use crate::types::{ALBUM_ORDERING, AlbumQuery};
use serde_json::Value;

impl FunkwhaleClient {
    /// List albums, optionally restricted to one artist.
    pub fn albums(&mut self, query: &AlbumQuery) -> Result<Value> {
        check_ordering(query.ordering.as_deref(), ALBUM_ORDERING)?;
        let params = Params::new()
            .opt("q", query.q.as_deref())
            .opt("artist", query.artist)
            .opt("ordering", query.ordering.as_deref())
            .opt("playable", query.playable)
            .opt("page", query.page)
            .opt("page_size", query.page_size);
        self.get_json("albums/", params)
    }

    pub fn album(&mut self, id: u64, refresh: bool) -> Result<Value> {
        self.get_json(&format!("albums/{id}/"), Params::new().set("refresh", refresh))
    }

    pub fn album_libraries(
        &mut self,
        id: u64,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Value> {
        let params = Params::new().opt("page", page).opt("page_size", page_size);
        self.get_json(&format!("albums/{id}/libraries/"), params)
    }
}
