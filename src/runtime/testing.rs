//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::db::{SessionRecord, UserSummary};
use crate::profile::{SessionId, UserProfile};
use crate::state_machine::ConversationState;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

// ============================================================================
// In-Memory Storage
// ============================================================================

/// In-memory storage for testing
pub struct InMemoryStorage {
    users: Mutex<Vec<(UserSummary, UserProfile)>>,
    states: Mutex<HashMap<String, ConversationState>>,
    sessions: Mutex<Vec<SessionRecord>>,
}

#[allow(dead_code)]
impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            states: Mutex::new(HashMap::new()),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Storage holding one user with the given profile
    pub fn with_user(user_id: &str, profile: UserProfile) -> Self {
        let storage = Self::new();
        let summary = UserSummary {
            id: user_id.to_string(),
            name: profile.name.clone(),
        };
        storage.users.lock().unwrap().push((summary, profile));
        storage
    }

    /// Seed a saved conversation snapshot
    pub fn seed_state(&self, user_id: &str, state: ConversationState) {
        self.states
            .lock()
            .unwrap()
            .insert(user_id.to_string(), state);
    }

    /// Get current snapshot for a user
    pub fn current_state(&self, user_id: &str) -> Option<ConversationState> {
        self.states.lock().unwrap().get(user_id).cloned()
    }

    /// Get the stored profile for a user
    pub fn profile(&self, user_id: &str) -> Option<UserProfile> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|(summary, _)| summary.id == user_id)
            .map(|(_, profile)| profile.clone())
    }

    /// Replace a stored profile without going through a runtime
    pub fn replace_profile(&self, user_id: &str, profile: UserProfile) {
        let mut users = self.users.lock().unwrap();
        if let Some(entry) = users.iter_mut().find(|(summary, _)| summary.id == user_id) {
            entry.1 = profile;
        }
    }

    /// All recorded sessions, oldest first
    pub fn recorded_sessions(&self) -> Vec<SessionRecord> {
        self.sessions.lock().unwrap().clone()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryStorage {
    async fn list_users(&self) -> Result<Vec<UserSummary>, String> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .map(|(summary, _)| summary.clone())
            .collect())
    }

    async fn create_user(
        &self,
        display_name: Option<&str>,
        profile: &UserProfile,
    ) -> Result<UserSummary, String> {
        let mut users = self.users.lock().unwrap();
        let summary = UserSummary {
            id: format!("user-{}", uuid::Uuid::new_v4()),
            name: display_name.map_or_else(|| format!("User {}", users.len() + 1), str::to_string),
        };
        users.push((summary.clone(), profile.clone()));
        Ok(summary)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, String> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|(summary, _)| summary.id == user_id)
            .map(|(summary, profile)| {
                let mut profile = profile.clone();
                profile.user_id = Some(summary.id.clone());
                profile.name.clone_from(&summary.name);
                profile
            }))
    }

    async fn update_user(&self, user_id: &str, profile: &UserProfile) -> Result<(), String> {
        let mut users = self.users.lock().unwrap();
        let entry = users
            .iter_mut()
            .find(|(summary, _)| summary.id == user_id)
            .ok_or_else(|| format!("User not found: {user_id}"))?;
        entry.1 = profile.clone();
        Ok(())
    }
}

#[async_trait]
impl StateStore for InMemoryStorage {
    async fn get_state(&self, user_id: &str) -> Result<Option<ConversationState>, String> {
        Ok(self.current_state(user_id))
    }

    async fn save_state(&self, user_id: &str, state: &ConversationState) -> Result<(), String> {
        self.seed_state(user_id, state.clone());
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemoryStorage {
    async fn record_session(
        &self,
        user_id: &str,
        session_id: SessionId,
        data: &Value,
    ) -> Result<(), String> {
        let mut sessions = self.sessions.lock().unwrap();
        let id = i64::try_from(sessions.len()).unwrap_or(i64::MAX) + 1;
        sessions.push(SessionRecord {
            id,
            user_id: user_id.to_string(),
            session_id,
            session_data: data.clone(),
            completed_at: chrono::Utc::now(),
        });
        Ok(())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, String> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Failing Storage
// ============================================================================

/// Storage whose reads succeed but whose writes always fail
pub struct FailingStorage {
    inner: InMemoryStorage,
}

impl FailingStorage {
    pub fn with_user(user_id: &str, profile: UserProfile) -> Self {
        Self {
            inner: InMemoryStorage::with_user(user_id, profile),
        }
    }
}

#[async_trait]
impl UserStore for FailingStorage {
    async fn list_users(&self) -> Result<Vec<UserSummary>, String> {
        self.inner.list_users().await
    }

    async fn create_user(
        &self,
        _display_name: Option<&str>,
        _profile: &UserProfile,
    ) -> Result<UserSummary, String> {
        Err("disk full".to_string())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, String> {
        self.inner.get_user(user_id).await
    }

    async fn update_user(&self, _user_id: &str, _profile: &UserProfile) -> Result<(), String> {
        Err("disk full".to_string())
    }
}

#[async_trait]
impl StateStore for FailingStorage {
    async fn get_state(&self, user_id: &str) -> Result<Option<ConversationState>, String> {
        self.inner.get_state(user_id).await
    }

    async fn save_state(&self, _user_id: &str, _state: &ConversationState) -> Result<(), String> {
        Err("disk full".to_string())
    }
}

#[async_trait]
impl SessionStore for FailingStorage {
    async fn record_session(
        &self,
        _user_id: &str,
        _session_id: SessionId,
        _data: &Value,
    ) -> Result<(), String> {
        Err("disk full".to_string())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, String> {
        self.inner.list_sessions(user_id).await
    }
}

// ============================================================================
// Flaky Profile Storage
// ============================================================================

/// In-memory storage whose first profile write fails
pub struct FlakyProfileStorage {
    inner: InMemoryStorage,
    failed: AtomicBool,
}

impl FlakyProfileStorage {
    pub fn with_user(user_id: &str, profile: UserProfile) -> Self {
        Self {
            inner: InMemoryStorage::with_user(user_id, profile),
            failed: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &InMemoryStorage {
        &self.inner
    }
}

#[async_trait]
impl UserStore for FlakyProfileStorage {
    async fn list_users(&self) -> Result<Vec<UserSummary>, String> {
        self.inner.list_users().await
    }

    async fn create_user(
        &self,
        display_name: Option<&str>,
        profile: &UserProfile,
    ) -> Result<UserSummary, String> {
        self.inner.create_user(display_name, profile).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, String> {
        self.inner.get_user(user_id).await
    }

    async fn update_user(&self, user_id: &str, profile: &UserProfile) -> Result<(), String> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err("transient".to_string());
        }
        self.inner.update_user(user_id, profile).await
    }
}

#[async_trait]
impl StateStore for FlakyProfileStorage {
    async fn get_state(&self, user_id: &str) -> Result<Option<ConversationState>, String> {
        self.inner.get_state(user_id).await
    }

    async fn save_state(&self, user_id: &str, state: &ConversationState) -> Result<(), String> {
        self.inner.save_state(user_id, state).await
    }
}

#[async_trait]
impl SessionStore for FlakyProfileStorage {
    async fn record_session(
        &self,
        user_id: &str,
        session_id: SessionId,
        data: &Value,
    ) -> Result<(), String> {
        self.inner.record_session(user_id, session_id, data).await
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>, String> {
        self.inner.list_sessions(user_id).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StaticContent;
    use crate::runtime::{RuntimeError, RuntimeManager, SseEvent};
    use crate::state_machine::{
        Event, MessageKind, PendingResponse, Phase, TransitionError, WELCOME_OPTIONS,
    };
    use std::sync::Arc;
    use std::time::Duration;

    const USER: &str = "user-test";

    fn manager(storage: Arc<InMemoryStorage>) -> RuntimeManager {
        RuntimeManager::new(storage, Arc::new(StaticContent::builtin())).with_pacing(false)
    }

    fn storage() -> Arc<InMemoryStorage> {
        Arc::new(InMemoryStorage::with_user(
            USER,
            UserProfile::default_diagnostic(),
        ))
    }

    #[tokio::test]
    async fn test_in_memory_storage() {
        let storage = InMemoryStorage::new();
        let first = storage
            .create_user(None, &UserProfile::default_diagnostic())
            .await
            .unwrap();
        let second = storage
            .create_user(Some("Ada"), &UserProfile::default_diagnostic())
            .await
            .unwrap();

        assert_eq!(first.name, "User 1");
        assert_eq!(second.name, "Ada");
        assert!(first.id.starts_with("user-"));

        let profile = storage.get_user(&second.id).await.unwrap().unwrap();
        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.user_id.as_deref(), Some(second.id.as_str()));
        assert!(storage.get_user("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_then_respond() {
        let storage = storage();
        let manager = manager(storage.clone());

        let opened = manager.send_event(USER, Event::Open).await.unwrap();
        assert_eq!(opened.messages.len(), 1);
        assert_eq!(opened.messages[0].kind, MessageKind::Welcome);
        assert_eq!(opened.pending.as_deref(), Some("welcome"));
        assert_eq!(
            opened.options,
            Some(WELCOME_OPTIONS.iter().map(ToString::to_string).collect())
        );

        let menu = manager
            .send_event(USER, Event::user_response("Start My Brain Health Guide"))
            .await
            .unwrap();
        assert_eq!(menu.pending.as_deref(), Some("session_select"));
        assert!(menu
            .messages
            .iter()
            .any(|m| m.kind == MessageKind::SessionMenu && m.menu.len() == 7));

        // Every turn overwrites the saved snapshot
        let saved = storage.current_state(USER).unwrap();
        assert_eq!(saved.pending_response, Some(PendingResponse::SessionSelect));
        assert_eq!(saved.recent_messages.last(), menu.messages.last());
    }

    #[tokio::test]
    async fn test_completion_records_session_and_profile() {
        let storage = storage();
        let manager = manager(storage.clone());

        manager.send_event(USER, Event::Open).await.unwrap();
        manager
            .send_event(USER, Event::user_response("Start My Brain Health Guide"))
            .await
            .unwrap();
        // Session 3 has no content yet, so starting it completes it
        let done = manager
            .send_event(USER, Event::user_response("Session 3"))
            .await
            .unwrap();

        assert!(done
            .messages
            .iter()
            .any(|m| m.kind == MessageKind::Celebration));
        assert_eq!(done.pending.as_deref(), Some("session_select"));

        let records = storage.recorded_sessions();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].session_id, 3);
        assert_eq!(
            records[0].session_data["title"],
            "Cognitive Strategies & Treatment"
        );

        let profile = storage.profile(USER).unwrap();
        assert!(profile.is_session_complete(3));
    }

    #[tokio::test]
    async fn test_saved_session_gets_welcome_back() {
        let storage = storage();
        let mut saved = ConversationState::default();
        saved.enter_session(1);
        saved.phase = Phase::Content;
        storage.seed_state(USER, saved);
        let manager = manager(storage);

        let opened = manager.send_event(USER, Event::Open).await.unwrap();
        assert_eq!(opened.messages[0].kind, MessageKind::WelcomeBack);
        assert_eq!(opened.pending.as_deref(), Some("resume_session_choice"));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let manager = manager(storage());
        let result = manager.send_event("user-nobody", Event::Open).await;
        assert!(matches!(result, Err(RuntimeError::UserNotFound(id)) if id == "user-nobody"));
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let storage = Arc::new(FailingStorage::with_user(
            USER,
            UserProfile::default_diagnostic(),
        ));
        let manager = RuntimeManager::new(storage, Arc::new(StaticContent::builtin()))
            .with_pacing(false);

        let result = manager.send_event(USER, Event::Open).await;
        assert!(matches!(result, Err(RuntimeError::Store(msg)) if msg == "disk full"));
    }

    #[tokio::test]
    async fn test_empty_input_keeps_runtime_alive() {
        let manager = manager(storage());
        manager.send_event(USER, Event::Open).await.unwrap();

        let result = manager.send_event(USER, Event::user_response("   ")).await;
        assert!(matches!(
            result,
            Err(RuntimeError::Transition(TransitionError::EmptyInput))
        ));

        // State is untouched and the runtime still answers
        let view = manager.snapshot(USER).await.unwrap();
        assert_eq!(view.pending.as_deref(), Some("welcome"));
        assert_eq!(view.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_messages_then_options() {
        let manager = manager(storage());
        let mut rx = manager.subscribe(USER).await.unwrap();

        manager.send_event(USER, Event::Open).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first, SseEvent::Message { ref message } if message.kind == MessageKind::Welcome));

        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match second {
            SseEvent::Options { options, pending } => {
                assert_eq!(options.map(|o| o.len()), Some(2));
                assert_eq!(pending.as_deref(), Some("welcome"));
            }
            other => panic!("Expected options, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_evict_reloads_profile() {
        let storage = storage();
        let manager = manager(storage.clone());
        let opened = manager.send_event(USER, Event::Open).await.unwrap();
        assert!(opened.messages[0].text.contains("Mild Cognitive Impairment"));

        let mut profile = UserProfile::default_diagnostic();
        profile.diagnosis = Some("Healthy ageing".to_string());
        storage.replace_profile(USER, profile);
        manager.evict(USER).await;

        let reopened = manager.send_event(USER, Event::Open).await.unwrap();
        assert!(!reopened.messages[0].text.contains("Mild Cognitive Impairment"));
        // Reloaded snapshot keeps the earlier transcript
        assert_eq!(storage.current_state(USER).unwrap().recent_messages.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_profile_write_still_records_session() {
        let storage = Arc::new(FlakyProfileStorage::with_user(
            USER,
            UserProfile::default_diagnostic(),
        ));
        let manager = RuntimeManager::new(storage.clone(), Arc::new(StaticContent::builtin()))
            .with_pacing(false);
        let mut rx = manager.subscribe(USER).await.unwrap();

        manager.send_event(USER, Event::Open).await.unwrap();
        manager
            .send_event(USER, Event::user_response("Start My Brain Health Guide"))
            .await
            .unwrap();

        let result = manager
            .send_event(USER, Event::user_response("Session 3"))
            .await;
        assert!(matches!(result, Err(RuntimeError::Store(msg)) if msg == "transient"));

        // The remaining writes of the turn still ran
        let records = storage.inner().recorded_sessions();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].session_id, 3);
        let saved = storage.inner().current_state(USER).unwrap();
        assert_eq!(saved.pending_response, Some(PendingResponse::SessionSelect));
        assert_eq!(saved.current_session_id, None);

        // Subscribers still get the celebration
        let mut celebrated = false;
        while let Ok(Ok(event)) = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await {
            if let SseEvent::Message { message } = event {
                celebrated |= message.kind == MessageKind::Celebration;
            }
        }
        assert!(celebrated);

        // The next completion persists the profile with both sessions
        manager
            .send_event(USER, Event::user_response("Session 4"))
            .await
            .unwrap();
        let sessions: Vec<_> = storage
            .inner()
            .recorded_sessions()
            .iter()
            .map(|r| r.session_id)
            .collect();
        assert_eq!(sessions, vec![3, 4]);
        let profile = storage.inner().profile(USER).unwrap();
        assert!(profile.is_session_complete(3) && profile.is_session_complete(4));
    }
}
