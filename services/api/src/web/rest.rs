//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    auth::{self, UserResponse},
    state::AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use syllabus_core::{
    Breakdown, BreakdownRepository, Chapter, GenerationError, LoadError, SyllabusSubmission, User,
};
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_breakdown_handler,
        list_breakdowns_handler,
        list_syllabuses_handler,
        auth::me_handler,
        auth::logout_handler,
    ),
    components(
        schemas(CreateBreakdownRequest, BreakdownResponse, SubmissionResponse, UserResponse)
    ),
    tags(
        (name = "Syllabus Breakdown API", description = "Turn syllabus text into chapter breakdowns and browse them.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateBreakdownRequest {
    /// The raw syllabus text.
    pub content: String,
}

/// A stored breakdown.
#[derive(Serialize, ToSchema, Debug)]
pub struct BreakdownResponse {
    pub id: Uuid,
    pub title: String,
    #[schema(value_type = Vec<Object>)]
    pub chapters: Vec<Chapter>,
    pub source_content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Breakdown> for BreakdownResponse {
    fn from(b: Breakdown) -> Self {
        Self {
            id: b.id,
            title: b.title,
            chapters: b.chapters,
            source_content: b.source_content,
            created_at: b.created_at,
        }
    }
}

/// A submitted syllabus text.
#[derive(Serialize, ToSchema, Debug)]
pub struct SubmissionResponse {
    pub id: Uuid,
    pub raw_content: String,
    pub created_at: DateTime<Utc>,
}

impl From<SyllabusSubmission> for SubmissionResponse {
    fn from(s: SyllabusSubmission) -> Self {
        Self {
            id: s.id,
            raw_content: s.raw_content,
            created_at: s.created_at,
        }
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

pub fn generation_error_response(err: &GenerationError) -> (StatusCode, String) {
    let status = match err {
        GenerationError::EmptyInput => StatusCode::BAD_REQUEST,
        GenerationError::Upstream(_) => StatusCode::BAD_GATEWAY,
        GenerationError::Persist { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

pub fn load_error_response(err: &LoadError) -> (StatusCode, String) {
    let status = match err {
        LoadError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        LoadError::PermissionDenied(_) => StatusCode::FORBIDDEN,
    };
    (status, err.to_string())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Generate a breakdown from syllabus text.
///
/// Runs the structuring service and stores the result for the signed-in user.
/// Open WebSocket sessions of the same user reload and select the new breakdown.
#[utoipa::path(
    post,
    path = "/breakdowns",
    request_body = CreateBreakdownRequest,
    responses(
        (status = 201, description = "Breakdown created", body = BreakdownResponse),
        (status = 400, description = "Empty syllabus content"),
        (status = 401, description = "No active session"),
        (status = 500, description = "Structuring succeeded but saving the breakdown failed"),
        (status = 502, description = "The structuring service failed")
    )
)]
pub async fn create_breakdown_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateBreakdownRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match app_state.pipeline.generate(user.id, &req.content).await {
        Ok(breakdown) => {
            info!(breakdown_id = %breakdown.id, "Breakdown created over REST.");
            Ok((StatusCode::CREATED, Json(BreakdownResponse::from(breakdown))))
        }
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "Breakdown generation failed.");
            Err(generation_error_response(&e))
        }
    }
}

/// List the signed-in user's breakdowns, newest first.
#[utoipa::path(
    get,
    path = "/breakdowns",
    responses(
        (status = 200, description = "The user's breakdowns", body = [BreakdownResponse]),
        (status = 401, description = "No active session"),
        (status = 403, description = "The store denied access"),
        (status = 503, description = "The store is unavailable")
    )
)]
pub async fn list_breakdowns_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<BreakdownResponse>>, (StatusCode, String)> {
    let mut repository = BreakdownRepository::new(app_state.store.clone());
    let breakdowns = repository.load(user.id).await.map_err(|e| {
        error!(user_id = %user.id, error = %e, "Failed to list breakdowns.");
        load_error_response(&e)
    })?;
    Ok(Json(
        breakdowns
            .iter()
            .cloned()
            .map(BreakdownResponse::from)
            .collect(),
    ))
}

/// List the signed-in user's submitted syllabus texts, newest first.
#[utoipa::path(
    get,
    path = "/syllabuses",
    responses(
        (status = 200, description = "The user's submissions", body = [SubmissionResponse]),
        (status = 401, description = "No active session"),
        (status = 403, description = "The store denied access"),
        (status = 503, description = "The store is unavailable")
    )
)]
pub async fn list_syllabuses_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<SubmissionResponse>>, (StatusCode, String)> {
    let mut repository = BreakdownRepository::new(app_state.store.clone());
    let submissions = repository.load_submissions(user.id).await.map_err(|e| {
        error!(user_id = %user.id, error = %e, "Failed to list submissions.");
        load_error_response(&e)
    })?;
    Ok(Json(
        submissions
            .iter()
            .cloned()
            .map(SubmissionResponse::from)
            .collect(),
    ))
}
