//! License endpoints: `GET /api/v1/licenses/` and `/licenses/{code}/`.
//!
//! Licenses are identified by code (`cc-by-sa-4.0`, `cc0-1.0`, ...).

use crate::client::{FunkwhaleClient, Params};
use crate::error::Result;
use serde_json::Value;

impl FunkwhaleClient {
    pub fn licenses(&mut self, page: Option<u32>, page_size: Option<u32>) -> Result<Value> {
        let params = Params::new().opt("page", page).opt("page_size", page_size);
        self.get_json("licenses/", params)
    }

    pub fn license(&mut self, code: &str) -> Result<Value> {
        let endpoint = format!("licenses/{}/", urlencoding::encode(code));
        self.get_json(&endpoint, Params::new())
    }
}
