//! API handlers for seminar rooms.

use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use seminar_orchestrator::{CreateSeminarRequest, OrchestratorError};
use seminar_types::{AgentStatus, SeminarRoom};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Request body for seminar room creation.
#[derive(Debug, Deserialize)]
pub struct CreateSeminarBody {
    pub seminar_id: String,
    pub title: String,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub recording_enabled: Option<bool>,
}

/// Response body for a created seminar room.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSeminarResponse {
    pub room_name: String,
    pub agent_deployed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListSeminarsResponse {
    pub rooms: Vec<String>,
}

/// Request body for a participant join token.
#[derive(Debug, Deserialize)]
pub struct JoinTokenBody {
    pub identity: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinTokenResponse {
    pub room_name: String,
    pub url: String,
    pub token: String,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("room service unavailable: {0}")]
    BadGateway(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidSeminarId(e) => ApiError::BadRequest(e.to_string()),
            OrchestratorError::InvalidMaxParticipants => {
                ApiError::BadRequest("max_participants must be positive".to_string())
            }
            OrchestratorError::AlreadyActive(room) => {
                ApiError::Conflict(format!("seminar room already active: {}", room))
            }
            OrchestratorError::RoomService(e) => ApiError::BadGateway(e.to_string()),
            OrchestratorError::Token(e) => ApiError::InternalServerError(e.to_string()),
            OrchestratorError::Task(e) => ApiError::InternalServerError(e.to_string()),
        }
    }
}

fn room_not_found(room_name: &str) -> ApiError {
    ApiError::NotFound(format!("seminar room not found: {}", room_name))
}

/// Handler for `POST /api/seminars`.
pub async fn create_seminar_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateSeminarBody>,
) -> Result<(StatusCode, Json<CreateSeminarResponse>), ApiError> {
    let max_participants = payload
        .max_participants
        .unwrap_or(state.seminar_defaults.default_max_participants);
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    let request = CreateSeminarRequest::new(payload.seminar_id, payload.title)
        .with_max_participants(max_participants)
        .with_recording(
            payload
                .recording_enabled
                .unwrap_or(state.seminar_defaults.default_recording_enabled),
        );

    let room_name = state.orchestrator.create_seminar_room(request).await?;
    let agent_deployed = state
        .orchestrator
        .get_room_status(&room_name)
        .is_some_and(|room| room.agent_deployed);

    Ok((
        StatusCode::CREATED,
        Json(CreateSeminarResponse {
            room_name,
            agent_deployed,
        }),
    ))
}

/// Handler for `GET /api/seminars`.
pub async fn list_seminars_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<ListSeminarsResponse> {
    Json(ListSeminarsResponse {
        rooms: state.orchestrator.list_active_rooms(),
    })
}

/// Handler for `GET /api/seminars/{roomName}`.
pub async fn get_seminar_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(room_name): Path<String>,
) -> Result<Json<SeminarRoom>, ApiError> {
    state
        .orchestrator
        .get_room_status(&room_name)
        .map(Json)
        .ok_or_else(|| room_not_found(&room_name))
}

/// Handler for `DELETE /api/seminars/{roomName}`.
pub async fn close_seminar_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(room_name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.orchestrator.close_seminar_room(&room_name).await? {
        Ok(Json(serde_json::json!({ "closed": true })))
    } else {
        Err(room_not_found(&room_name))
    }
}

/// Handler for `POST /api/seminars/{roomName}/agent`.
///
/// Responds `{"deployed": false}` when an agent is already running or the
/// process could not be spawned.
pub async fn deploy_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(room_name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.orchestrator.get_room_status(&room_name).is_none() {
        return Err(room_not_found(&room_name));
    }
    let deployed = state.orchestrator.deploy_agent(&room_name).await;
    Ok(Json(serde_json::json!({ "deployed": deployed })))
}

/// Handler for `DELETE /api/seminars/{roomName}/agent`.
pub async fn stop_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(room_name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.orchestrator.get_room_status(&room_name).is_none() {
        return Err(room_not_found(&room_name));
    }
    let stopped = state.orchestrator.stop_agent(&room_name).await;
    Ok(Json(serde_json::json!({ "stopped": stopped })))
}

/// Handler for `GET /api/seminars/{roomName}/agent`.
pub async fn get_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(room_name): Path<String>,
) -> Result<Json<AgentStatus>, ApiError> {
    state
        .orchestrator
        .agent_status(&room_name)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no agent running in {}", room_name)))
}

/// Handler for `POST /api/seminars/{roomName}/token`.
pub async fn issue_token_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(room_name): Path<String>,
    Json(payload): Json<JoinTokenBody>,
) -> Result<Json<JoinTokenResponse>, ApiError> {
    let identity = payload.identity.trim();
    if identity.is_empty() {
        return Err(ApiError::BadRequest("identity must not be empty".to_string()));
    }
    let name = payload.name.as_deref().unwrap_or(identity);

    let grant = state
        .orchestrator
        .issue_join_token(&room_name, identity, name)
        .await?
        .ok_or_else(|| room_not_found(&room_name))?;

    Ok(Json(JoinTokenResponse {
        room_name,
        url: grant.url,
        token: grant.token,
    }))
}
