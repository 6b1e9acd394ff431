//! Handlers for the owner's own URLs.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::dto::user_urls::UserUrlItem;
use crate::api::middleware::owner::CurrentOwner;
use crate::error::AppError;
use crate::state::AppState;

/// Lists every URL the caller shortened.
///
/// # Endpoint
///
/// `GET /api/user/urls`
///
/// Answers 200 with `[{"short_url", "original_url"}]`, or 204 when the caller
/// has none.
pub async fn list_user_urls_handler(
    State(state): State<AppState>,
    CurrentOwner(owner_id): CurrentOwner,
) -> Result<Response, AppError> {
    let records = state.link_service.list_for_owner(&owner_id).await?;

    if records.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let items: Vec<UserUrlItem> = records
        .into_iter()
        .map(|record| UserUrlItem {
            short_url: state.link_service.short_url(&record.code),
            original_url: record.original_url,
        })
        .collect();

    Ok(Json(items).into_response())
}

/// Requests deletion of some of the caller's codes.
///
/// # Endpoint
///
/// `DELETE /api/user/urls` with a JSON array of codes.
///
/// Answers 202 right away; deletion happens in the background. Codes that
/// are malformed or belong to someone else are ignored.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    CurrentOwner(owner_id): CurrentOwner,
    Json(codes): Json<Vec<String>>,
) -> StatusCode {
    state.link_service.delete(owner_id, codes);

    StatusCode::ACCEPTED
}
