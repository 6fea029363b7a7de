//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    CreateUserRequest, ErrorResponse, RecordSessionRequest, RespondRequest, SaveStateRequest,
    SuccessResponse, UpdateUserRequest, UserListResponse,
};
use super::AppState;
use crate::content::Session;
use crate::db::{SessionRecord, UserSummary};
use crate::profile::UserProfile;
use crate::runtime::{RuntimeError, SessionStore, SseEvent, StateStore, TurnOutcome, UserStore};
use crate::state_machine::{ConversationState, Event};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Users
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:id", get(get_user).put(update_user))
        // Saved conversation snapshots
        .route("/api/conversation-states", post(save_conversation_state))
        .route(
            "/api/conversation-states/:user_id",
            get(get_conversation_state),
        )
        // Completed sessions
        .route("/api/sessions", post(record_session))
        .route("/api/sessions/user/:user_id", get(list_sessions))
        // Curriculum
        .route("/api/content/sessions", get(list_content_sessions))
        // Dialogue
        .route("/api/chat/:user_id/open", post(open_chat))
        .route("/api/chat/:user_id/respond", post(respond))
        .route("/api/chat/:user_id/stream", get(stream_chat))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Users
// ============================================================

async fn list_users(State(state): State<AppState>) -> Result<Json<UserListResponse>, AppError> {
    let users = state
        .runtime
        .storage()
        .list_users()
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(UserListResponse { users }))
}

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<UserSummary>, AppError> {
    let profile = req
        .profile
        .unwrap_or_else(UserProfile::default_diagnostic);
    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());

    let user = state
        .runtime
        .storage()
        .create_user(name, &profile)
        .await
        .map_err(AppError::Internal)?;

    tracing::info!(user_id = %user.id, name = %user.name, "Created user");
    Ok(Json(user))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    state
        .runtime
        .storage()
        .get_user(&id)
        .await
        .map_err(AppError::Internal)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User not found: {id}")))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    require_user(&state, &id).await?;
    state
        .runtime
        .storage()
        .update_user(&id, &req.profile)
        .await
        .map_err(AppError::Internal)?;

    // A live runtime holds the old profile
    state.runtime.evict(&id).await;
    Ok(Json(SuccessResponse::ok()))
}

// ============================================================
// Conversation States
// ============================================================

async fn get_conversation_state(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Option<ConversationState>>, AppError> {
    let saved = state
        .runtime
        .storage()
        .get_state(&user_id)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(saved))
}

async fn save_conversation_state(
    State(state): State<AppState>,
    Json(req): Json<SaveStateRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    require_user(&state, &req.user_id).await?;
    state
        .runtime
        .storage()
        .save_state(&req.user_id, &req.state)
        .await
        .map_err(AppError::Internal)?;

    state.runtime.evict(&req.user_id).await;
    Ok(Json(SuccessResponse::ok()))
}

// ============================================================
// Sessions
// ============================================================

async fn record_session(
    State(state): State<AppState>,
    Json(req): Json<RecordSessionRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    require_user(&state, &req.user_id).await?;
    state
        .runtime
        .storage()
        .record_session(&req.user_id, req.session_id, &req.session_data)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(SuccessResponse::ok()))
}

async fn list_sessions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<SessionRecord>>, AppError> {
    let records = state
        .runtime
        .storage()
        .list_sessions(&user_id)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(records))
}

async fn list_content_sessions(State(state): State<AppState>) -> Json<Vec<Session>> {
    Json(state.runtime.content().sessions().to_vec())
}

// ============================================================
// Dialogue
// ============================================================

async fn open_chat(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<TurnOutcome>, AppError> {
    let outcome = state.runtime.send_event(&user_id, Event::Open).await?;
    Ok(Json(outcome))
}

async fn respond(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    let outcome = state
        .runtime
        .send_event(&user_id, Event::user_response(req.text))
        .await?;
    Ok(Json(outcome))
}

async fn stream_chat(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    // Subscribe before the snapshot so nothing emitted in between is lost
    let broadcast_rx = state.runtime.subscribe(&user_id).await?;
    let view = state.runtime.snapshot(&user_id).await?;

    Ok(sse_stream(SseEvent::Init { view }, broadcast_rx))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("brain-health-companion ", env!("CARGO_PKG_VERSION"))
}

async fn require_user(state: &AppState, user_id: &str) -> Result<(), AppError> {
    match state.runtime.storage().get_user(user_id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(AppError::NotFound(format!("User not found: {user_id}"))),
        Err(e) => Err(AppError::Internal(e)),
    }
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Transition(e) => AppError::BadRequest(e.to_string()),
            RuntimeError::UserNotFound(_) => AppError::NotFound(err.to_string()),
            RuntimeError::Store(_) | RuntimeError::ChannelClosed => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
