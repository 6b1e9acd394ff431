//! API route configuration.
//!
//! Every route here needs a request owner, resolved by
//! [`crate::api::middleware::owner::layer`].

use axum::{
    Router,
    routing::{get, post},
};

use crate::api::handlers::{
    delete_user_urls_handler, list_user_urls_handler, shorten_batch_handler, shorten_json_handler,
    shorten_text_handler,
};
use crate::state::AppState;

/// Routes acting on behalf of an owner.
///
/// # Endpoints
///
/// - `POST   /`                   - Shorten a URL sent as plain text
/// - `POST   /api/shorten`        - Shorten a URL sent as JSON
/// - `POST   /api/shorten/batch`  - Shorten several URLs at once
/// - `GET    /api/user/urls`      - List the owner's URLs
/// - `DELETE /api/user/urls`      - Delete some of the owner's URLs
pub fn owned_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(shorten_text_handler))
        .route("/api/shorten", post(shorten_json_handler))
        .route("/api/shorten/batch", post(shorten_batch_handler))
        .route(
            "/api/user/urls",
            get(list_user_urls_handler).delete(delete_user_urls_handler),
        )
}
