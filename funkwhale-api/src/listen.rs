//! Audio stream endpoint: `GET /api/v1/listen/{uuid}/`.
//!
//! Takes a track **uuid** (not its numeric ID) and answers with the first
//! audio file the user can access. Query parameters:
//!
//! - `to`: transcode on the fly (`ogg` or `mp3`); slow, only request it
//!   for formats the player cannot decode
//! - `upload`: pick a specific upload uuid when a track has several
//!
//! The endpoint supports byte-range requests; pass a `Range` header through
//! [`Session::call`](crate::Session::call) to use them.

use crate::client::{FunkwhaleClient, Params, check_choice};
use crate::error::Result;
use crate::types::LISTEN_FORMATS;
use reqwest::blocking::Response;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

impl FunkwhaleClient {
    /// Open the audio stream for a track.
    ///
    /// Returns the raw response; read it with [`Response::copy_to`] or
    /// [`Response::bytes`].
    ///
    /// # Errors
    ///
    /// - [`FunkwhaleError::Validation`](crate::FunkwhaleError::Validation):
    ///   `to` is not one of [`LISTEN_FORMATS`]
    pub fn listen(&mut self, uuid: &str, to: Option<&str>, upload: Option<&str>) -> Result<Response> {
        check_choice("to", to, LISTEN_FORMATS)?;
        let params = Params::new().opt("to", to).opt("upload", upload);
        let endpoint = format!("listen/{}/", urlencoding::encode(uuid));
        self.get_raw(&endpoint, params)
    }

    /// Stream a track into `dest`. Returns the number of bytes written.
    pub fn download(&mut self, uuid: &str, to: Option<&str>, dest: &Path) -> Result<u64> {
        let mut resp = self.listen(uuid, to, None)?;
        let mut out = BufWriter::new(File::create(dest)?);
        let written = resp.copy_to(&mut out)?;
        out.flush()?;
        info!(uuid, bytes = written, dest = %dest.display(), "track downloaded");
        Ok(written)
    }
}
