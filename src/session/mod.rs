//! Conversation session manager.
//!
//! [`ChatSession`] owns the conversation list, the active conversation's
//! message log, the per-conversation send pipeline and the input buffer.
//! State sits behind a mutex that is never held across an `.await`; the
//! backend call is the only suspension point.

pub mod context;
pub mod input;
pub mod message_log;
pub mod pipeline;
pub mod registry;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::ChatBackend;
use crate::config::Config;
use crate::error::{FetchTarget, SessionError, SessionResult};
use crate::events::{Notice, SessionEvent};

pub use context::{Credential, SessionContext};
pub use input::InputBuffer;
pub use message_log::{DeliveryStatus, Message, MessageId, MessageLog, Role};
pub use pipeline::{SendOutcome, SendPipeline, SendState};
pub use registry::{ConversationId, ConversationRegistry, ConversationSummary};

/// Behaviour switches for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Put the content of a failed send back into the input buffer.
    pub restore_input_on_failure: bool,
    /// Select the first conversation after `open` when none is active.
    pub auto_select_first: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            restore_input_on_failure: false,
            auto_select_first: true,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            restore_input_on_failure: config.restore_input_on_failure,
            auto_select_first: config.auto_select_first,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    registry: ConversationRegistry,
    log: MessageLog,
    pipeline: SendPipeline,
    input: InputBuffer,
}

/// Session manager shared by the front end and in-flight sends.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    state: Arc<Mutex<SessionState>>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    options: SessionOptions,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>, options: SessionOptions) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(SessionState::default())),
            events: None,
            options,
        }
    }

    /// Deliver [`SessionEvent`]s to `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        // State is only mutated by short non-panicking sections.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            // A closed receiver just means nobody is rendering.
            let _ = events.send(event);
        }
    }

    /// Surface a failure to the user and hand it back for propagation.
    fn fail(&self, error: SessionError) -> SessionError {
        warn!("{}", error);
        self.emit(SessionEvent::Notice(Notice::from(&error)));
        error
    }

    // ---- read side ------------------------------------------------------

    /// Conversation summaries in display order.
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.state().registry.list().to_vec()
    }

    pub fn active_conversation(&self) -> Option<ConversationId> {
        self.state().registry.active().cloned()
    }

    /// Snapshot of the active conversation's log.
    pub fn messages(&self) -> Vec<Message> {
        self.state().log.snapshot()
    }

    pub fn last_assistant_message(&self) -> Option<Message> {
        self.state().log.last_assistant().cloned()
    }

    pub fn send_state(&self, id: &ConversationId) -> SendState {
        self.state().pipeline.state(id)
    }

    /// Resolve a 1-based list position or literal id to a known conversation.
    pub fn resolve_conversation(&self, reference: &str) -> Option<ConversationId> {
        self.state().registry.resolve(reference)
    }

    pub fn input(&self) -> String {
        self.state().input.content().to_string()
    }

    pub fn set_input(&self, content: impl Into<String>) {
        self.state().input.set(content);
    }

    // ---- registry operations -------------------------------------------

    /// Replace the conversation list with the backend's.
    pub async fn refresh_conversations(&self, ctx: &SessionContext) -> SessionResult<Vec<ConversationSummary>> {
        let listing = self
            .backend
            .list_conversations(ctx)
            .await
            .map_err(|source| {
                self.fail(SessionError::FetchFailed {
                    target: FetchTarget::ConversationList,
                    source,
                })
            })?;

        let summaries: Vec<ConversationSummary> = listing.iter().map(|dto| dto.summary()).collect();
        let list = {
            let mut state = self.state();
            state.registry.replace_all(summaries);
            state.registry.list().to_vec()
        };

        debug!("refreshed {} conversations", list.len());
        self.emit(SessionEvent::ConversationsReplaced { count: list.len() });
        Ok(list)
    }

    /// Refresh the list and, if configured, select the first conversation
    /// when none is active.
    pub async fn open(&self, ctx: &SessionContext) -> SessionResult<Vec<ConversationSummary>> {
        let list = self.refresh_conversations(ctx).await?;

        if self.options.auto_select_first && self.active_conversation().is_none() {
            if let Some(first) = list.first() {
                self.select_conversation(ctx, &first.id).await?;
            }
        }
        Ok(list)
    }

    /// Create a conversation, put it at the head of the list and make it
    /// active with an empty log.
    pub async fn create_conversation(&self, ctx: &SessionContext) -> SessionResult<ConversationSummary> {
        let dto = self
            .backend
            .create_conversation(ctx)
            .await
            .map_err(|source| self.fail(SessionError::CreateFailed(source)))?;

        let summary = dto.summary();
        let id = summary.id.clone();
        {
            let mut state = self.state();
            state.registry.insert_head(summary.clone());
            state.registry.set_active(id.clone());
            state.log = MessageLog::for_conversation(id.clone());
        }

        info!("created conversation {}", id);
        self.emit(SessionEvent::ConversationCreated { id });
        Ok(summary)
    }

    /// Make `id` active and load its history.
    ///
    /// The pointer moves before the fetch, so on failure later sends still
    /// target `id`; the log then stays empty.
    pub async fn select_conversation(&self, ctx: &SessionContext, id: &ConversationId) -> SessionResult<Vec<Message>> {
        {
            let mut state = self.state();
            state.registry.set_active(id.clone());
            state.log = MessageLog::for_conversation(id.clone());
        }
        self.emit(SessionEvent::ConversationSelected { id: id.clone() });

        let dto = self
            .backend
            .get_conversation(ctx, id)
            .await
            .map_err(|source| {
                self.fail(SessionError::FetchFailed {
                    target: FetchTarget::Conversation(id.clone()),
                    source,
                })
            })?;

        let mut history = dto.into_messages();
        let snapshot = {
            let mut state = self.state();
            if !state.registry.is_active(id) || !state.log.is_for(id) {
                debug!("discarding history for {}: no longer active", id);
                return Ok(history);
            }

            // Keep what was sent while the history was loading, unless the
            // server copy of the exchange is already in it.
            let in_history = |id: &MessageId| history.iter().any(|h| &h.id == id);
            let entries: Vec<&Message> = state.log.iter().collect();
            let local: Vec<Message> = entries
                .iter()
                .enumerate()
                .filter(|(i, m)| {
                    if in_history(&m.id) {
                        return false;
                    }
                    if m.is_pending() {
                        return true;
                    }
                    let answered = entries
                        .get(i + 1)
                        .is_some_and(|next| next.role == Role::Assistant && in_history(&next.id));
                    !answered
                })
                .map(|(_, m)| (*m).clone())
                .collect();
            history.extend(local);

            if let Some(first) = history.first() {
                let first = first.content.clone();
                state.registry.fill_preview(id, &first);
            }
            state.log = MessageLog::with_history(id.clone(), history);
            state.log.snapshot()
        };

        debug!("loaded {} messages for {}", snapshot.len(), id);
        self.emit(SessionEvent::HistoryLoaded {
            id: id.clone(),
            messages: snapshot.len(),
        });
        Ok(snapshot)
    }

    /// Delete `id` on the backend, then drop it from the list.
    ///
    /// A 404 means the conversation is already gone and counts as success.
    /// On any other failure the list and active pointer are untouched.
    pub async fn delete_conversation(&self, ctx: &SessionContext, id: &ConversationId) -> SessionResult<()> {
        match self.backend.delete_conversation(ctx, id).await {
            Ok(()) => {}
            Err(source) if source.is_not_found() => {
                debug!("conversation {} already absent on the backend", id);
            }
            Err(source) => {
                return Err(self.fail(SessionError::DeleteFailed {
                    id: id.clone(),
                    source,
                }));
            }
        }

        let was_active = {
            let mut state = self.state();
            let was_active = state.registry.remove(id);
            if was_active {
                state.log = MessageLog::detached();
            }
            was_active
        };

        info!("deleted conversation {}", id);
        self.emit(SessionEvent::ConversationDeleted {
            id: id.clone(),
            was_active,
        });
        self.emit(SessionEvent::Notice(Notice::info("Conversation deleted")));
        Ok(())
    }

    // ---- send pipeline --------------------------------------------------

    /// Send the input buffer's content to the active conversation.
    ///
    /// The buffer is cleared only when the send actually starts.
    pub async fn submit_input(&self, ctx: &SessionContext) -> SessionResult<SendOutcome> {
        let content = self.input();
        self.send(ctx, &content).await
    }

    /// Send `content` to the active conversation.
    ///
    /// Optimistically appends the user message, performs exactly one
    /// backend call, then either appends the reply or removes the
    /// optimistic entry and reports `SendFailed`. With no active
    /// conversation this only creates one; see [`SendOutcome::Bootstrapped`].
    pub async fn send(&self, ctx: &SessionContext, content: &str) -> SessionResult<SendOutcome> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(SendOutcome::Empty);
        }

        let started = {
            let mut state = self.state();
            match state.registry.active().cloned() {
                None => None,
                Some(conversation_id) => {
                    let message = Message::pending_user(content);
                    let Some(handle) = state.pipeline.begin(conversation_id.clone(), message.id.clone()) else {
                        debug!("send to {} ignored: another send is in flight", conversation_id);
                        return Ok(SendOutcome::Ignored);
                    };
                    state.log.append(message.clone());
                    state.input.clear();
                    Some((conversation_id, message, handle))
                }
            }
        };

        let Some((conversation_id, message, handle)) = started else {
            let summary = self.create_conversation(ctx).await?;
            return Ok(SendOutcome::Bootstrapped(summary.id));
        };

        info!("sending {} to conversation {}", message.id, conversation_id);
        self.emit(SessionEvent::MessageAppended {
            conversation_id: conversation_id.clone(),
            message: message.clone(),
        });

        let cancel = handle.cancel_signal();
        let result = tokio::select! {
            result = self.backend.send_message(ctx, &conversation_id, content) => Some(result),
            () = cancel.notified() => None,
        };

        let mut state = self.state();
        state.pipeline.finish(&conversation_id);

        match result {
            Some(Ok(reply)) => {
                let reply = reply.into_message(DeliveryStatus::Committed);
                // The optimistic entry only survives in the log the send was issued against.
                let same_log = state.registry.is_active(&conversation_id)
                    && state.log.is_for(&conversation_id)
                    && state.log.mark_committed(&message.id);
                if !same_log || state.log.contains(&reply.id) {
                    debug!("reply for {} arrived after its log was replaced; not applied", conversation_id);
                    return Ok(SendOutcome::Detached(reply));
                }

                state.log.append(reply.clone());
                if let Some(first) = state.log.first().map(|m| m.content.clone()) {
                    state.registry.fill_preview(&conversation_id, &first);
                }
                drop(state);

                info!("committed reply {} in conversation {}", reply.id, conversation_id);
                self.emit(SessionEvent::MessageAppended {
                    conversation_id,
                    message: reply.clone(),
                });
                Ok(SendOutcome::Committed(reply))
            }
            Some(Err(source)) => {
                let removed = state.log.remove_by_id(&message.id);
                if self.options.restore_input_on_failure && state.input.is_blank() {
                    state.input.set(content);
                }
                drop(state);

                if removed {
                    self.emit(SessionEvent::MessageRolledBack {
                        conversation_id: conversation_id.clone(),
                        message_id: message.id.clone(),
                    });
                }
                Err(self.fail(SessionError::SendFailed {
                    id: conversation_id,
                    source,
                }))
            }
            None => {
                let removed = state.log.remove_by_id(&message.id);
                drop(state);

                info!("send {} to conversation {} cancelled", message.id, conversation_id);
                if removed {
                    self.emit(SessionEvent::MessageRolledBack {
                        conversation_id,
                        message_id: message.id,
                    });
                }
                Ok(SendOutcome::Cancelled)
            }
        }
    }

    /// Stop waiting for the in-flight send of `id`, rolling it back.
    ///
    /// Returns `false` when nothing is in flight for `id`.
    pub fn cancel_send(&self, id: &ConversationId) -> bool {
        self.state().pipeline.cancel(id)
    }
}
