//! services/api/src/web/auth.rs
//!
//! Authentication endpoints. Accounts and logins are owned by the external
//! identity provider; this service only reads and ends sessions.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use syllabus_core::{AuthError, User};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{
    middleware::{SessionToken, SESSION_COOKIE},
    state::AppState,
};

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            display_name: user.display_name,
            email: user.email,
        }
    }
}

/// Maps an identity failure onto an HTTP status and message.
pub fn auth_error_response(err: AuthError) -> (StatusCode, String) {
    match err {
        AuthError::NotSignedIn => (StatusCode::UNAUTHORIZED, "No active session".to_string()),
        AuthError::Provider(reason) => {
            error!("Identity provider failed: {}", reason);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Identity provider unavailable".to_string(),
            )
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /auth/me - The currently signed-in user
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The signed-in user", body = UserResponse),
        (status = 401, description = "No active session")
    )
)]
pub async fn me_handler(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// POST /auth/logout - End the current session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session"),
        (status = 503, description = "Identity provider unavailable")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(SessionToken(token)): Extension<SessionToken>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .identity
        .sign_out(&token)
        .await
        .map_err(|e| auth_error_response(AuthError::from(e)))?;
    info!("Session signed out.");

    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}
