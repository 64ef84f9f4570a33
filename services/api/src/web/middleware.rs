//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use syllabus_core::AuthError;
use tracing::{error, warn};

use crate::web::state::AppState;

/// The name of the cookie carrying the identity provider's session token.
pub const SESSION_COOKIE: &str = "session";

/// The raw session token of an authenticated request.
#[derive(Clone, Debug)]
pub struct SessionToken(pub String);

/// Extracts the session token from the `Cookie` header, if there is one.
fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| {
            c.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|token| !token.is_empty())
}

/// Middleware that resolves the session cookie to the signed-in `User`.
///
/// If valid, inserts the `User` and the `SessionToken` into request extensions.
/// If invalid or missing, returns 401 Unauthorized; provider failures return 503.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = session_token(req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let user = state
        .identity
        .current_user(&token)
        .await
        .map_err(|e| match AuthError::from(e) {
            AuthError::NotSignedIn => StatusCode::UNAUTHORIZED,
            AuthError::Provider(reason) => {
                error!("Failed to validate auth session: {}", reason);
                StatusCode::SERVICE_UNAVAILABLE
            }
        })?
        .ok_or_else(|| {
            warn!("Rejected request with an unknown or expired session.");
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(user);
    req.extensions_mut().insert(SessionToken(token));

    Ok(next.run(req).await)
}
