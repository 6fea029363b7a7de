//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the runtime with mock implementations.

use crate::db::{Database, DbError, SessionRecord, UserSummary};
use crate::profile::{SessionId, UserProfile};
use crate::state_machine::ConversationState;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Storage for user profiles
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserSummary>, String>;

    /// Create a user, naming it `User {n+1}` when no name is given
    async fn create_user(
        &self,
        display_name: Option<&str>,
        profile: &UserProfile,
    ) -> Result<UserSummary, String>;

    /// Profile with `user_id` and `name` filled in, or `None` for unknown ids
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, String>;

    async fn update_user(&self, user_id: &str, profile: &UserProfile) -> Result<(), String>;
}

/// Storage for conversation snapshots
#[async_trait]
pub trait StateStore: Send + Sync {
    /// The saved snapshot; malformed snapshots read as `None`
    async fn get_state(&self, user_id: &str) -> Result<Option<ConversationState>, String>;

    /// Overwrite the saved snapshot
    async fn save_state(&self, user_id: &str, state: &ConversationState) -> Result<(), String>;
}

/// Log of completed sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn record_session(
        &self,
        user_id: &str,
        session_id: SessionId,
        data: &Value,
    ) -> Result<(), String>;

    /// Most recent first
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, String>;
}

/// Combined storage trait for convenience
pub trait Storage: UserStore + StateStore + SessionStore {}
impl<T: UserStore + StateStore + SessionStore> Storage for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: UserStore + ?Sized> UserStore for Arc<T> {
    async fn list_users(&self) -> Result<Vec<UserSummary>, String> {
        (**self).list_users().await
    }

    async fn create_user(
        &self,
        display_name: Option<&str>,
        profile: &UserProfile,
    ) -> Result<UserSummary, String> {
        (**self).create_user(display_name, profile).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, String> {
        (**self).get_user(user_id).await
    }

    async fn update_user(&self, user_id: &str, profile: &UserProfile) -> Result<(), String> {
        (**self).update_user(user_id, profile).await
    }
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    async fn get_state(&self, user_id: &str) -> Result<Option<ConversationState>, String> {
        (**self).get_state(user_id).await
    }

    async fn save_state(&self, user_id: &str, state: &ConversationState) -> Result<(), String> {
        (**self).save_state(user_id, state).await
    }
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn record_session(
        &self,
        user_id: &str,
        session_id: SessionId,
        data: &Value,
    ) -> Result<(), String> {
        (**self).record_session(user_id, session_id, data).await
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, String> {
        (**self).list_sessions(user_id).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as Storage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for DatabaseStorage {
    async fn list_users(&self) -> Result<Vec<UserSummary>, String> {
        self.db.list_users().map_err(|e| e.to_string())
    }

    async fn create_user(
        &self,
        display_name: Option<&str>,
        profile: &UserProfile,
    ) -> Result<UserSummary, String> {
        let record = self
            .db
            .create_user(display_name, profile)
            .map_err(|e| e.to_string())?;
        Ok(UserSummary {
            id: record.id,
            name: record.display_name,
        })
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, String> {
        match self.db.get_user(user_id) {
            Ok(record) => Ok(Some(record.into_profile())),
            Err(DbError::UserNotFound(_)) => Ok(None),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn update_user(&self, user_id: &str, profile: &UserProfile) -> Result<(), String> {
        self.db
            .update_user(user_id, profile)
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl StateStore for DatabaseStorage {
    async fn get_state(&self, user_id: &str) -> Result<Option<ConversationState>, String> {
        self.db
            .get_conversation_state(user_id)
            .map_err(|e| e.to_string())
    }

    async fn save_state(&self, user_id: &str, state: &ConversationState) -> Result<(), String> {
        self.db
            .save_conversation_state(user_id, state)
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl SessionStore for DatabaseStorage {
    async fn record_session(
        &self,
        user_id: &str,
        session_id: SessionId,
        data: &Value,
    ) -> Result<(), String> {
        self.db
            .record_session(user_id, session_id, data)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, String> {
        self.db.list_sessions(user_id).map_err(|e| e.to_string())
    }
}
