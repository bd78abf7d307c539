//! Ordered message log of the active conversation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::registry::ConversationId;

const LOCAL_PREFIX: &str = "local-";

/// Message identifier, either server-assigned or locally generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Fresh collision-resistant id for a locally originated message.
    pub fn local() -> Self {
        Self(format!("{LOCAL_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_PREFIX)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Brainyx",
        }
    }
}

/// Delivery state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    /// Local user message awaiting the server exchange.
    Pending,
    /// Confirmed; never modified afterwards.
    Committed,
    /// Exchange failed. Such messages are removed rather than kept.
    Failed,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl Message {
    /// Optimistic user message for a send that has not completed yet.
    pub fn pending_user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::local(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            status: DeliveryStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == DeliveryStatus::Pending
    }
}

/// Append-only message sequence scoped to one conversation.
///
/// Entries keep insertion order; the only removal is rollback of an
/// optimistic entry.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    conversation_id: Option<ConversationId>,
    messages: Vec<Message>,
}

impl MessageLog {
    /// Empty log not bound to any conversation.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Empty log for `conversation_id`.
    pub fn for_conversation(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            messages: Vec::new(),
        }
    }

    /// Log for `conversation_id` holding already-fetched history.
    pub fn with_history(conversation_id: ConversationId, messages: Vec<Message>) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            messages,
        }
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    /// Whether this log belongs to `id`.
    pub fn is_for(&self, id: &ConversationId) -> bool {
        self.conversation_id.as_ref() == Some(id)
    }

    /// Add a message to the tail.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Remove the entry with `id`, if present.
    ///
    /// Returns whether an entry was removed.
    pub fn remove_by_id(&mut self, id: &MessageId) -> bool {
        match self.messages.iter().position(|m| &m.id == id) {
            Some(index) => {
                self.messages.remove(index);
                true
            }
            None => false,
        }
    }

    /// Upgrade a pending entry to committed. Committed entries are left alone.
    pub fn mark_committed(&mut self, id: &MessageId) -> bool {
        match self.messages.iter_mut().find(|m| &m.id == id && m.is_pending()) {
            Some(message) => {
                message.status = DeliveryStatus::Committed;
                true
            }
            None => false,
        }
    }

    /// Restartable iterator over the messages in display order.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Cloned copy of the current contents.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn first(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Most recent committed assistant reply.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.status == DeliveryStatus::Committed)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
