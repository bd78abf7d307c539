//! Wire shapes exchanged with the Brainyx backend.
//!
//! Fields the backend may omit are `Option`s; conversion into session types
//! fills them in explicitly.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{ConversationId, ConversationSummary, DeliveryStatus, Message, MessageId, Role};

/// A message as returned by the chat endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDto {
    #[serde(default)]
    pub id: Option<String>,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl MessageDto {
    /// Convert into a session message with the given delivery status.
    ///
    /// A missing id is replaced with a local one and a missing or
    /// unparsable timestamp with the current instant.
    pub fn into_message(self, status: DeliveryStatus) -> Message {
        let id = self.id.map(MessageId::from).unwrap_or_else(MessageId::local);
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(parse_instant)
            .unwrap_or_else(Utc::now);

        Message {
            id,
            role: self.role,
            content: self.content,
            timestamp,
            status,
        }
    }
}

/// A conversation as returned by the list, create and detail endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDto {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<MessageDto>>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl ConversationDto {
    /// Sidebar summary, previewing the first message.
    pub fn summary(&self) -> ConversationSummary {
        let first = self
            .messages
            .as_ref()
            .and_then(|messages| messages.first())
            .map(|message| message.content.as_str());

        ConversationSummary::new(
            ConversationId::from(self.id.as_str()),
            first,
            self.created_at.as_deref().and_then(parse_instant),
            self.updated_at.as_deref().and_then(parse_instant),
        )
    }

    /// Full history as committed messages, in server order.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
            .unwrap_or_default()
            .into_iter()
            .map(|dto| dto.into_message(DeliveryStatus::Committed))
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessageBody<'a> {
    pub content: &'a str,
}

/// Parse an ISO-8601 instant. Values without an offset are taken as UTC.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Account profile from `auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub masked_email: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub credits: Option<u64>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub system_prompt: String,
}

/// Remaining credits and current plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub credits: u64,
    pub plan: String,
}

/// A purchasable credit plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(skip)]
    pub key: String,
    pub name: String,
    pub price: f64,
    pub credits: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlansResponse {
    pub plans: HashMap<String, Plan>,
}

impl PlansResponse {
    /// Flatten the keyed catalog into a list ordered by price.
    pub fn into_sorted(self) -> Vec<Plan> {
        let mut plans: Vec<Plan> = self
            .plans
            .into_iter()
            .map(|(key, plan)| Plan { key, ..plan })
            .collect();
        plans.sort_by(|a, b| a.price.total_cmp(&b.price).then_with(|| a.key.cmp(&b.key)));
        plans
    }
}

/// An API key owned by the account. `key` is only returned in full on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateApiKeyBody<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateProfileBody<'a> {
    pub name: &'a str,
}

/// Hosted checkout page for a plan purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckoutBody<'a> {
    pub plan_id: &'a str,
    pub origin_url: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Positive,
    Negative,
}

#[derive(Debug, Serialize)]
pub(crate) struct FeedbackBody<'a> {
    pub message_id: &'a str,
    pub feedback_type: FeedbackKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<&'a str>,
}

/// Reply from the public `v1/chat` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectChatReply {
    pub response: String,
    #[serde(default)]
    pub credits_remaining: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DirectChatBody<'a> {
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}
