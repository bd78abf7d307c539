//! Conversation list and active-conversation pointer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque server-assigned conversation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sidebar entry for one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    /// Content of the first message, already truncated for display.
    pub first_message_preview: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationSummary {
    /// Characters of the first message shown before truncation.
    pub const PREVIEW_CHARS: usize = 30;
    pub const ELLIPSIS: &'static str = "...";
    /// Shown for a conversation with no messages yet.
    pub const PLACEHOLDER: &'static str = "New conversation";

    pub fn new(
        id: ConversationId,
        first_message: Option<&str>,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            first_message_preview: first_message.map(truncate_preview),
            created_at,
            updated_at,
        }
    }

    /// Display text for the sidebar.
    pub fn preview(&self) -> &str {
        self.first_message_preview
            .as_deref()
            .unwrap_or(Self::PLACEHOLDER)
    }
}

/// Truncate to `PREVIEW_CHARS` characters, marking the cut with an ellipsis.
pub fn truncate_preview(content: &str) -> String {
    let limit = ConversationSummary::PREVIEW_CHARS;
    match content.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", &content[..cut], ConversationSummary::ELLIPSIS),
        None => content.to_string(),
    }
}

/// Ordered conversation summaries plus the active pointer.
///
/// The list is newest-first by creation. Only the session mutates it.
#[derive(Debug, Clone, Default)]
pub struct ConversationRegistry {
    conversations: Vec<ConversationSummary>,
    active: Option<ConversationId>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summaries in display order.
    pub fn list(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn get(&self, id: &ConversationId) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.get(id).is_some()
    }

    /// Replace the whole list with a fresh backend listing.
    ///
    /// Sorted newest-first by creation; entries without a creation instant
    /// go last in the order received. Duplicate ids keep their first entry.
    /// The active pointer is left alone.
    pub fn replace_all(&mut self, summaries: Vec<ConversationSummary>) {
        let mut unique: Vec<ConversationSummary> = Vec::with_capacity(summaries.len());
        for summary in summaries {
            if !unique.iter().any(|c| c.id == summary.id) {
                unique.push(summary);
            }
        }
        unique.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.conversations = unique;
    }

    /// Insert a just-created conversation at the head.
    pub fn insert_head(&mut self, summary: ConversationSummary) {
        self.conversations.retain(|c| c.id != summary.id);
        self.conversations.insert(0, summary);
    }

    /// Remove an entry, clearing the active pointer if it referenced it.
    ///
    /// Returns whether the removed conversation was the active one.
    pub fn remove(&mut self, id: &ConversationId) -> bool {
        self.conversations.retain(|c| &c.id != id);
        if self.active.as_ref() == Some(id) {
            self.active = None;
            return true;
        }
        false
    }

    pub fn active(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    pub fn set_active(&mut self, id: ConversationId) {
        self.active = Some(id);
    }

    pub fn is_active(&self, id: &ConversationId) -> bool {
        self.active.as_ref() == Some(id)
    }

    /// Set the preview from a conversation's first message if it has none yet.
    pub fn fill_preview(&mut self, id: &ConversationId, first_message: &str) {
        if let Some(summary) = self.conversations.iter_mut().find(|c| &c.id == id) {
            if summary.first_message_preview.is_none() {
                summary.first_message_preview = Some(truncate_preview(first_message));
            }
        }
    }

    /// Resolve a 1-based list position or a literal id.
    pub fn resolve(&self, reference: &str) -> Option<ConversationId> {
        if let Ok(position) = reference.parse::<usize>() {
            if let Some(summary) = position.checked_sub(1).and_then(|i| self.conversations.get(i)) {
                return Some(summary.id.clone());
            }
        }
        let id = ConversationId::from(reference);
        self.contains(&id).then_some(id)
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
