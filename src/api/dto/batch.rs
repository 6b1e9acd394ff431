//! DTOs for batch shortening.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// One item of `POST /api/shorten/batch`.
///
/// `correlation_id` is opaque to the service and echoed back unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct BatchRequestItem {
    #[validate(length(min = 1, message = "correlation_id must not be empty"))]
    pub correlation_id: String,

    #[validate(url(message = "Invalid URL format"))]
    pub original_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponseItem {
    pub correlation_id: String,
    pub short_url: String,
}
