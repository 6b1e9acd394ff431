//! Owner identification middleware and extractor.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use tracing::warn;

use crate::application::services::auth_service::OWNER_COOKIE;
use crate::domain::entities::OwnerId;
use crate::error::AppError;
use crate::state::AppState;

/// Owner of the current request, placed in extensions by [`layer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentOwner(pub OwnerId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentOwner {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CurrentOwner>().copied().ok_or_else(|| {
            AppError::unauthorized(
                "Unauthorized",
                json!({ "reason": "Request owner is not identified" }),
            )
        })
    }
}

/// Resolves the request owner and stores it as [`CurrentOwner`].
///
/// When the owner was issued just now, the signed token is returned in a
/// `Set-Cookie` header so the next request keeps the same identity.
///
/// ```rust,ignore
/// let owned = Router::new()
///     .route("/api/user/urls", get(list_user_urls_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), owner::layer));
/// ```
pub async fn layer(State(st): State<AppState>, mut req: Request, next: Next) -> Response {
    let resolved = st.owner_resolver.resolve(req.headers());
    req.extensions_mut().insert(CurrentOwner(resolved.owner_id));

    let mut response = next.run(req).await;

    if let Some(token) = resolved.issued_token {
        let cookie = format!("{OWNER_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!("Failed to build owner cookie: {}", e),
        }
    }

    response
}
