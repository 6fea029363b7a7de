//! Runtime for executing chats
//!
//! One actor task per user owns that user's `ChatState`; commands reach it
//! over an mpsc channel so turns for a user are handled one at a time.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ChatRuntime;
pub use traits::*;

use crate::content::ContentRepository;
use crate::db::Database;
use crate::state_machine::{ChatContext, ChatState, Event, Message, Phase, TransitionError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

/// Errors surfaced to callers of the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Storage error: {0}")]
    Store(String),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Chat runtime is no longer running")]
    ChannelClosed,
}

/// What a turn produced, or the current view of a conversation
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub messages: Vec<Message>,
    pub options: Option<Vec<String>>,
    pub pending: Option<String>,
    pub phase: Phase,
}

impl TurnOutcome {
    pub fn from_state(state: &ChatState, messages: Vec<Message>) -> Self {
        Self {
            messages,
            options: state.conversation.answer_options.clone(),
            pending: state.pending().map(|p| p.name().to_string()),
            phase: state.conversation.phase,
        }
    }
}

/// Commands accepted by a chat runtime
#[derive(Debug)]
pub enum RuntimeCommand {
    Event {
        event: Event,
        reply: oneshot::Sender<Result<TurnOutcome, RuntimeError>>,
    },
    Snapshot {
        reply: oneshot::Sender<TurnOutcome>,
    },
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init {
        view: TurnOutcome,
    },
    Message {
        message: Message,
    },
    Options {
        options: Option<Vec<String>>,
        pending: Option<String>,
    },
    Error {
        message: String,
    },
}

/// Handle to interact with a running chat
#[derive(Clone)]
pub struct ChatHandle {
    pub command_tx: mpsc::Sender<RuntimeCommand>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
}

/// Manager for all chat runtimes
pub struct RuntimeManager {
    storage: Arc<dyn Storage>,
    content: Arc<dyn ContentRepository>,
    pacing: bool,
    runtimes: RwLock<HashMap<String, ChatHandle>>,
}

impl RuntimeManager {
    pub fn new(storage: Arc<dyn Storage>, content: Arc<dyn ContentRepository>) -> Self {
        Self {
            storage,
            content,
            pacing: true,
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    /// Manager backed by the SQLite database
    pub fn with_database(db: Database, content: Arc<dyn ContentRepository>) -> Self {
        Self::new(Arc::new(DatabaseStorage::new(db)), content)
    }

    /// Whether SSE broadcasts honor emission delays
    pub fn with_pacing(mut self, pacing: bool) -> Self {
        self.pacing = pacing;
        self
    }

    /// Get or create the runtime for a user
    pub async fn get_or_create(&self, user_id: &str) -> Result<ChatHandle, RuntimeError> {
        // Check if already running
        {
            let runtimes = self.runtimes.read().await;
            if let Some(handle) = runtimes.get(user_id) {
                if !handle.command_tx.is_closed() {
                    return Ok(handle.clone());
                }
            }
        }

        let mut runtimes = self.runtimes.write().await;
        // Another caller may have started it while we waited for the lock
        if let Some(handle) = runtimes.get(user_id) {
            if !handle.command_tx.is_closed() {
                return Ok(handle.clone());
            }
        }

        let profile = self
            .storage
            .get_user(user_id)
            .await
            .map_err(RuntimeError::Store)?
            .ok_or_else(|| RuntimeError::UserNotFound(user_id.to_string()))?;
        let state = match self
            .storage
            .get_state(user_id)
            .await
            .map_err(RuntimeError::Store)?
        {
            Some(snapshot) => {
                tracing::info!(
                    user_id,
                    session_id = ?snapshot.current_session_id,
                    "Resuming saved conversation"
                );
                ChatState::resume(snapshot)
            }
            None => ChatState::new(),
        };

        let context = ChatContext::new(user_id, profile, Arc::clone(&self.content));
        let (command_tx, command_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);

        let runtime = ChatRuntime::new(
            context,
            state,
            Arc::clone(&self.storage),
            command_rx,
            broadcast_tx.clone(),
        )
        .with_pacing(self.pacing);

        // Start runtime in background
        let owner = user_id.to_string();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::info!(user_id = %owner, "Chat runtime finished");
        });

        let handle = ChatHandle {
            command_tx,
            broadcast_tx,
        };
        runtimes.insert(user_id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Run one event through a user's runtime and wait for the outcome
    pub async fn send_event(
        &self,
        user_id: &str,
        event: Event,
    ) -> Result<TurnOutcome, RuntimeError> {
        let handle = self.get_or_create(user_id).await?;
        let (reply, outcome) = oneshot::channel();
        handle
            .command_tx
            .send(RuntimeCommand::Event { event, reply })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        outcome.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Current transcript, options, and pending response
    pub async fn snapshot(&self, user_id: &str) -> Result<TurnOutcome, RuntimeError> {
        let handle = self.get_or_create(user_id).await?;
        let (reply, view) = oneshot::channel();
        handle
            .command_tx
            .send(RuntimeCommand::Snapshot { reply })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        view.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Subscribe to chat updates
    pub async fn subscribe(
        &self,
        user_id: &str,
    ) -> Result<broadcast::Receiver<SseEvent>, RuntimeError> {
        let handle = self.get_or_create(user_id).await?;
        Ok(handle.broadcast_tx.subscribe())
    }

    /// Stop a user's runtime so the next access reloads from storage.
    /// Used after the profile or snapshot is replaced out of band.
    pub async fn evict(&self, user_id: &str) {
        if self.runtimes.write().await.remove(user_id).is_some() {
            tracing::debug!(user_id, "Evicted chat runtime");
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn content(&self) -> &Arc<dyn ContentRepository> {
        &self.content
    }
}
