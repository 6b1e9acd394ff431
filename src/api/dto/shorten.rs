//! DTOs for single URL shortening.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /api/shorten`.
#[derive(Debug, Deserialize, Validate)]
pub struct ShortenRequest {
    #[validate(url(message = "Invalid URL format"))]
    pub url: String,
}

/// Response of `POST /api/shorten`, same shape for created and duplicate.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub result: String,
}
