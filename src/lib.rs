//! Terminal client for the Brainyx conversational assistant.
//!
//! The core is [`session::ChatSession`]: the conversation list, the active
//! conversation's message log and the single-flight send pipeline, driven
//! through the [`api::ChatBackend`] seam.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod repl;
pub mod session;

pub use api::{ChatBackend, HttpBackend};
pub use config::Config;
pub use error::{ApiError, SessionError};
pub use session::{ChatSession, SessionContext, SessionOptions};
