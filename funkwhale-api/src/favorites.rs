//! Favorite tracks of the current user.
//!
//! | Method              | Endpoint                               |
//! |---------------------|----------------------------------------|
//! | `favorite_tracks`   | `GET  /api/v1/favorites/tracks/`       |
//! | `add_favorite`      | `POST /api/v1/favorites/tracks/`       |
//! | `remove_favorite`   | `POST /api/v1/favorites/tracks/remove/`|
//!
//! Both `POST` endpoints take `{ "track": <id> }`. Removing answers
//! `204 No Content`.

use crate::client::{FunkwhaleClient, Params};
use crate::error::Result;
use serde_json::{Value, json};

impl FunkwhaleClient {
    pub fn favorite_tracks(&mut self, page: Option<u32>, page_size: Option<u32>) -> Result<Value> {
        let params = Params::new().opt("page", page).opt("page_size", page_size);
        self.get_json("favorites/tracks/", params)
    }

    /// Mark a track as favorite. Returns the created favorite.
    pub fn add_favorite(&mut self, track_id: u64) -> Result<Value> {
        self.post_json("favorites/tracks/", json!({ "track": track_id }))
    }

    pub fn remove_favorite(&mut self, track_id: u64) -> Result<()> {
        self.post_json("favorites/tracks/remove/", json!({ "track": track_id }))?;
        Ok(())
    }
}
