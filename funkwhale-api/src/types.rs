//! Filter arguments for the listing endpoints.
//!
//! Every field is optional; unset fields are not sent. `ordering` takes one
//! of the endpoint's sortable fields, prefixed with `-` for descending order.
//! Pagination defaults on the server side are `page=1`, `page_size=25`.

/// Sortable fields of `GET /api/v1/artists/`.
pub const ARTIST_ORDERING: &[&str] = &["creation_date", "id", "name"];

/// Sortable fields of `GET /api/v1/albums/`.
pub const ALBUM_ORDERING: &[&str] = &["creation_date", "release_date", "title"];

/// Sortable fields of `GET /api/v1/tracks/`.
pub const TRACK_ORDERING: &[&str] = &["creation_date", "release_date", "title"];

/// Transcoding targets accepted by `GET /api/v1/listen/{uuid}/`.
pub const LISTEN_FORMATS: &[&str] = &["ogg", "mp3"];

/// Filters for [`FunkwhaleClient::artists`](crate::FunkwhaleClient::artists).
#[derive(Debug, Clone, Default)]
pub struct ArtistQuery {
    /// Search query.
    pub q: Option<String>,
    /// One of [`ARTIST_ORDERING`].
    pub ordering: Option<String>,
    /// Only artists with playable tracks.
    pub playable: Option<bool>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Filters for [`FunkwhaleClient::albums`](crate::FunkwhaleClient::albums).
#[derive(Debug, Clone, Default)]
pub struct AlbumQuery {
    pub q: Option<String>,
    /// Only albums by this artist ID.
    pub artist: Option<u64>,
    /// One of [`ALBUM_ORDERING`].
    pub ordering: Option<String>,
    pub playable: Option<bool>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Filters for [`FunkwhaleClient::tracks`](crate::FunkwhaleClient::tracks).
#[derive(Debug, Clone, Default)]
pub struct TrackQuery {
    pub q: Option<String>,
    pub artist: Option<u64>,
    pub album: Option<u64>,
    /// Only (or exclude) tracks favorited by the current user.
    pub favorites: Option<bool>,
    /// License code, e.g. `cc-by-4.0`.
    pub license: Option<String>,
    /// One of [`TRACK_ORDERING`].
    pub ordering: Option<String>,
    pub playable: Option<bool>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}
