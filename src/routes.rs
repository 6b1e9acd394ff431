//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /{code}`  - Short URL redirect (public)
//! - `GET  /ping`    - Storage health check (public)
//! - everything in [`crate::api::routes::owned_routes`], behind owner resolution
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Compression** - Gzip responses and gzip request bodies
//! - **Owner** - Signed cookie identifying the caller
//! - **Path normalization** - Trailing slash handling

use axum::routing::get;
use axum::{Router, middleware};
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

use crate::api;
use crate::api::handlers::{ping_handler, redirect_handler};
use crate::api::middleware::{compression, owner, tracing};
use crate::state::AppState;

/// Router with every route and middleware except path normalization.
///
/// `compression_level` is the gzip level for responses, 1 to 9.
pub fn router(state: AppState, compression_level: u32) -> Router {
    let owned = api::routes::owned_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), owner::layer));

    Router::new()
        .route("/ping", get(ping_handler))
        .route("/{code}", get(redirect_handler))
        .merge(owned)
        .with_state(state)
        .layer(compression::decompression_layer())
        .layer(compression::layer(compression_level))
        .layer(tracing::layer())
}

/// Application service as served by the binary.
pub fn app_router(state: AppState, compression_level: u32) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router(state, compression_level))
}
