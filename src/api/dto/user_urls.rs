//! DTOs for the owner's URL list.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct UserUrlItem {
    pub short_url: String,
    pub original_url: String,
}
