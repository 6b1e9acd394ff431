//! Handler for short URL redirect.

use axum::{
    extract::{Path, State},
    response::Redirect,
};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short code to its original URL.
///
/// # Endpoint
///
/// `GET /{code}`
///
/// # Response Codes
///
/// - **307 Temporary Redirect**: `Location` holds the original URL
/// - **400 Bad Request**: the code does not match the code pattern
/// - **404 Not Found**: no record carries the code
/// - **410 Gone**: the record was deleted by its owner
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let record = state.link_service.resolve(&code).await?;
    debug!("Redirecting {} to {}", code, record.original_url);

    Ok(Redirect::temporary(&record.original_url))
}
