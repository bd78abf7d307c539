//! Backend access: the conversation seam, its HTTP implementation and the
//! account endpoints around it.

pub mod account;
pub mod client;
pub mod credit_gate;
pub mod types;

use std::future::Future;
use std::pin::Pin;

use crate::error::ApiResult;
use crate::session::{ConversationId, SessionContext};

pub use client::HttpBackend;
pub use credit_gate::{CreditGate, GateVerdict};
pub use types::{ConversationDto, MessageDto};

/// Boxed future type for backend operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'a>>;

/// Conversation endpoints consumed by the session.
pub trait ChatBackend: Send + Sync {
    /// All conversations of the authenticated user.
    fn list_conversations<'a>(&'a self, ctx: &'a SessionContext) -> ApiFuture<'a, Vec<ConversationDto>>;

    /// Create a new, empty conversation.
    fn create_conversation<'a>(&'a self, ctx: &'a SessionContext) -> ApiFuture<'a, ConversationDto>;

    /// One conversation with its full message history.
    fn get_conversation<'a>(
        &'a self,
        ctx: &'a SessionContext,
        id: &'a ConversationId,
    ) -> ApiFuture<'a, ConversationDto>;

    /// Delete a conversation.
    fn delete_conversation<'a>(&'a self, ctx: &'a SessionContext, id: &'a ConversationId) -> ApiFuture<'a, ()>;

    /// Post a user message and return the assistant's reply.
    ///
    /// A successful call debits one credit.
    fn send_message<'a>(
        &'a self,
        ctx: &'a SessionContext,
        id: &'a ConversationId,
        content: &'a str,
    ) -> ApiFuture<'a, MessageDto>;
}
