//! Per-conversation single-flight bookkeeping for outgoing messages.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Notify;

use super::message_log::{Message, MessageId};
use super::registry::ConversationId;

/// Send state of one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Sending,
}

/// Result of a `send` call that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Content was blank after trimming; nothing happened.
    Empty,
    /// A send for this conversation is already in flight; ignored.
    Ignored,
    /// No conversation was active. One was created and the content was not
    /// sent; call `send` again to deliver it.
    Bootstrapped(ConversationId),
    /// The reply was appended to the active log.
    Committed(Message),
    /// The reply arrived after the user switched conversations and was not
    /// applied to the new log.
    Detached(Message),
    /// The send was cancelled and its optimistic message rolled back.
    Cancelled,
}

/// Handle for one in-flight send.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub local_id: MessageId,
    cancel: Arc<Notify>,
}

impl InFlight {
    /// Shared signal raced against the backend response.
    pub fn cancel_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.cancel)
    }
}

/// Tracks which conversations have a send in flight.
#[derive(Debug, Default)]
pub struct SendPipeline {
    in_flight: HashMap<ConversationId, InFlight>,
}

impl SendPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: &ConversationId) -> SendState {
        if self.in_flight.contains_key(id) {
            SendState::Sending
        } else {
            SendState::Idle
        }
    }

    /// Move `id` from `Idle` to `Sending`.
    ///
    /// Returns `None` when a send for `id` is already in flight.
    pub fn begin(&mut self, id: ConversationId, local_id: MessageId) -> Option<InFlight> {
        if self.in_flight.contains_key(&id) {
            return None;
        }
        let handle = InFlight {
            local_id,
            cancel: Arc::new(Notify::new()),
        };
        self.in_flight.insert(id, handle.clone());
        Some(handle)
    }

    /// Return `id` to `Idle` after commit or rollback.
    pub fn finish(&mut self, id: &ConversationId) -> Option<InFlight> {
        self.in_flight.remove(id)
    }

    /// Signal the in-flight send for `id` to stop waiting for its response.
    ///
    /// The permit is stored, so a cancel issued before the send starts
    /// waiting still takes effect.
    pub fn cancel(&self, id: &ConversationId) -> bool {
        match self.in_flight.get(id) {
            Some(handle) => {
                handle.cancel.notify_one();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_is_single_flight_per_conversation() {
        let mut pipeline = SendPipeline::new();
        let c1 = ConversationId::from("c1");
        let c2 = ConversationId::from("c2");

        assert!(pipeline.begin(c1.clone(), MessageId::local()).is_some());
        assert!(pipeline.begin(c1.clone(), MessageId::local()).is_none());
        assert!(pipeline.begin(c2.clone(), MessageId::local()).is_some());
        assert_eq!(pipeline.state(&c1), SendState::Sending);
        assert_eq!(pipeline.state(&c2), SendState::Sending);
    }

    #[test]
    fn test_finish_returns_to_idle() {
        let mut pipeline = SendPipeline::new();
        let c1 = ConversationId::from("c1");
        let local = MessageId::local();

        pipeline.begin(c1.clone(), local.clone());
        let finished = pipeline.finish(&c1).map(|h| h.local_id);
        assert_eq!(finished, Some(local));
        assert_eq!(pipeline.state(&c1), SendState::Idle);
        assert!(pipeline.begin(c1, MessageId::local()).is_some());
    }

    #[test]
    fn test_cancel_without_send_is_false() {
        let pipeline = SendPipeline::new();
        assert!(!pipeline.cancel(&ConversationId::from("c1")));
    }

    #[tokio::test]
    async fn test_cancel_before_wait_is_remembered() {
        let mut pipeline = SendPipeline::new();
        let c1 = ConversationId::from("c1");
        let handle = pipeline.begin(c1.clone(), MessageId::local()).expect("idle");

        assert!(pipeline.cancel(&c1));
        // resolves immediately because the permit was stored
        handle.cancel_signal().notified().await;
    }
}
