//! Handlers for single URL shortening.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use validator::Validate;

use crate::api::dto::shorten::{ShortenRequest, ShortenResponse};
use crate::api::middleware::owner::CurrentOwner;
use crate::domain::entities::Saved;
use crate::error::AppError;
use crate::state::AppState;

fn status_for(saved: &Saved) -> StatusCode {
    if saved.is_duplicate() {
        StatusCode::CONFLICT
    } else {
        StatusCode::CREATED
    }
}

/// Shortens a URL sent as plain text.
///
/// # Endpoint
///
/// `POST /`
///
/// # Response
///
/// - **201 Created**: body is the new short URL
/// - **409 Conflict**: the owner already shortened this URL; body is the
///   existing short URL
/// - **400 Bad Request**: body is not an absolute URL
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    CurrentOwner(owner_id): CurrentOwner,
    body: String,
) -> Result<(StatusCode, String), AppError> {
    let saved = state.link_service.shorten(owner_id, &body).await?;
    let short_url = state.link_service.short_url(&saved.record().code);

    Ok((status_for(&saved), short_url))
}

/// Shortens a URL sent as JSON.
///
/// # Endpoint
///
/// `POST /api/shorten`
///
/// ```json
/// { "url": "https://example.com/" }
/// ```
///
/// Answers `{"result": "<short url>"}` with 201, or 409 for a duplicate.
pub async fn shorten_json_handler(
    State(state): State<AppState>,
    CurrentOwner(owner_id): CurrentOwner,
    Json(payload): Json<ShortenRequest>,
) -> Result<(StatusCode, Json<ShortenResponse>), AppError> {
    payload.validate()?;

    let saved = state.link_service.shorten(owner_id, &payload.url).await?;
    let result = state.link_service.short_url(&saved.record().code);

    Ok((status_for(&saved), Json(ShortenResponse { result })))
}
