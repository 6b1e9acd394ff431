//! Handler for batch shortening.

use axum::{Json, extract::State, http::StatusCode};
use validator::Validate;

use crate::api::dto::batch::{BatchRequestItem, BatchResponseItem};
use crate::api::middleware::owner::CurrentOwner;
use crate::error::AppError;
use crate::state::AppState;

/// Shortens several URLs in one storage transaction.
///
/// # Endpoint
///
/// `POST /api/shorten/batch`
///
/// # Request Body
///
/// ```json
/// [
///   { "correlation_id": "a", "original_url": "https://example.com/1" },
///   { "correlation_id": "b", "original_url": "https://example.com/2" }
/// ]
/// ```
///
/// # Response
///
/// 201 with `[{"correlation_id", "short_url"}]` in request order. URLs the
/// owner shortened before come back with their existing short URL.
///
/// # Errors
///
/// Returns 400 if the batch is empty or any item is invalid; nothing is
/// stored in that case.
pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    CurrentOwner(owner_id): CurrentOwner,
    Json(payload): Json<Vec<BatchRequestItem>>,
) -> Result<(StatusCode, Json<Vec<BatchResponseItem>>), AppError> {
    for item in &payload {
        item.validate()?;
    }

    let (correlation_ids, urls): (Vec<String>, Vec<String>) = payload
        .into_iter()
        .map(|item| (item.correlation_id, item.original_url))
        .unzip();

    let saved = state.link_service.shorten_batch(owner_id, urls).await?;

    let items = correlation_ids
        .into_iter()
        .zip(saved)
        .map(|(correlation_id, saved)| BatchResponseItem {
            correlation_id,
            short_url: state.link_service.short_url(&saved.record().code),
        })
        .collect();

    Ok((StatusCode::CREATED, Json(items)))
}
