//! Per-user chat runtime executor

use super::traits::Storage;
use super::{RuntimeCommand, RuntimeError, SseEvent, TurnOutcome};

use crate::state_machine::{transition, ChatContext, ChatState, Effect, Event};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Events queued for the SSE broadcaster, each with the pause before it
type PacedBatch = Vec<(Duration, SseEvent)>;

/// Chat runtime that owns one user's state and works with any storage
pub struct ChatRuntime<S>
where
    S: Storage + 'static,
{
    context: ChatContext,
    state: ChatState,
    storage: S,
    command_rx: mpsc::Receiver<RuntimeCommand>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    /// Honor emission delays when broadcasting
    pacing: bool,
}

impl<S> ChatRuntime<S>
where
    S: Storage + 'static,
{
    pub fn new(
        context: ChatContext,
        state: ChatState,
        storage: S,
        command_rx: mpsc::Receiver<RuntimeCommand>,
        broadcast_tx: broadcast::Sender<SseEvent>,
    ) -> Self {
        Self {
            context,
            state,
            storage,
            command_rx,
            broadcast_tx,
            pacing: true,
        }
    }

    pub fn with_pacing(mut self, pacing: bool) -> Self {
        self.pacing = pacing;
        self
    }

    pub async fn run(mut self) {
        tracing::info!(user_id = %self.context.user_id, "Starting chat runtime");

        // Broadcasting runs on its own task so paced delays never hold up replies
        let (paced_tx, paced_rx) = mpsc::unbounded_channel();
        let broadcaster = tokio::spawn(broadcast_paced(
            paced_rx,
            self.broadcast_tx.clone(),
            self.pacing,
        ));

        // Process commands in a loop - no recursion
        while let Some(command) = self.command_rx.recv().await {
            match command {
                RuntimeCommand::Event { event, reply } => {
                    let result = self.handle_event(event, &paced_tx).await;
                    if let Err(e) = &result {
                        tracing::error!(user_id = %self.context.user_id, error = %e, "Error handling event");
                        let _ = self.broadcast_tx.send(SseEvent::Error {
                            message: e.to_string(),
                        });
                    }
                    let _ = reply.send(result);
                }
                RuntimeCommand::Snapshot { reply } => {
                    let messages = self.state.conversation.recent_messages.clone();
                    let _ = reply.send(TurnOutcome::from_state(&self.state, messages));
                }
            }
        }

        drop(paced_tx);
        let _ = broadcaster.await;
        tracing::info!(user_id = %self.context.user_id, "Chat runtime stopped");
    }

    async fn handle_event(
        &mut self,
        event: Event,
        paced_tx: &mpsc::UnboundedSender<PacedBatch>,
    ) -> Result<TurnOutcome, RuntimeError> {
        // Pure state transition
        let result = transition(&self.state, &self.context, event)?;

        if let Some(profile) = result.profile {
            self.context.profile = profile;
        }
        self.state = result.new_state;

        let mut batch = PacedBatch::new();
        let mut messages = Vec::new();
        // Every store write is attempted; the first failure is reported
        let mut store_error = None;
        for effect in result.effects {
            match effect {
                Effect::NotifyMessage { message, delay } => {
                    messages.push(message.clone());
                    batch.push((delay, SseEvent::Message { message }));
                }
                Effect::NotifyOptions { options } => {
                    batch.push((
                        Duration::ZERO,
                        SseEvent::Options {
                            options,
                            pending: self.state.pending().map(|p| p.name().to_string()),
                        },
                    ));
                }
                other => {
                    if let Err(e) = self.execute_effect(other).await {
                        tracing::warn!(user_id = %self.context.user_id, error = %e, "Store write failed");
                        store_error.get_or_insert(e);
                    }
                }
            }
        }

        tracing::debug!(
            user_id = %self.context.user_id,
            pending = ?self.state.pending().map(|p| p.name()),
            emitted = messages.len(),
            "Turn complete"
        );

        // The conversation has moved on either way, so subscribers still see it
        let _ = paced_tx.send(batch);
        match store_error {
            Some(e) => Err(e),
            None => Ok(TurnOutcome::from_state(&self.state, messages)),
        }
    }

    async fn execute_effect(&self, effect: Effect) -> Result<(), RuntimeError> {
        let user_id = self.context.user_id.as_str();
        match effect {
            Effect::PersistState => self
                .storage
                .save_state(user_id, &self.state.conversation)
                .await
                .map_err(RuntimeError::Store),

            Effect::PersistProfile => self
                .storage
                .update_user(user_id, &self.context.profile)
                .await
                .map_err(RuntimeError::Store),

            Effect::RecordSession { session_id, data } => {
                tracing::info!(user_id, session_id, "Recording completed session");
                self.storage
                    .record_session(user_id, session_id, &data)
                    .await
                    .map_err(RuntimeError::Store)
            }

            // Notifications are batched by the caller
            Effect::NotifyMessage { .. } | Effect::NotifyOptions { .. } => Ok(()),
        }
    }
}

async fn broadcast_paced(
    mut paced_rx: mpsc::UnboundedReceiver<PacedBatch>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    pacing: bool,
) {
    while let Some(batch) = paced_rx.recv().await {
        for (delay, event) in batch {
            if pacing && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            // No subscribers is fine
            let _ = broadcast_tx.send(event);
        }
    }
}
