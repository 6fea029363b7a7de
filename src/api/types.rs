//! API request and response types

use crate::db::UserSummary;
use crate::profile::{SessionId, UserProfile};
use crate::state_machine::ConversationState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to create a new user
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub profile: Option<UserProfile>,
}

/// Request to replace a user's profile
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub profile: UserProfile,
}

/// Response with a list of users
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserSummary>,
}

/// Request to overwrite a saved conversation snapshot
#[derive(Debug, Deserialize)]
pub struct SaveStateRequest {
    pub user_id: String,
    pub state: ConversationState,
}

/// Request to log a completed session
#[derive(Debug, Deserialize)]
pub struct RecordSessionRequest {
    pub user_id: String,
    pub session_id: SessionId,
    #[serde(default)]
    pub session_data: Value,
}

/// Request carrying one user reply
#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub text: String,
}

/// Response for write actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
