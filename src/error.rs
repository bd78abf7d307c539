//! Error types for backend requests and session operations.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::api::credit_gate::{CreditGate, GateVerdict};
use crate::session::ConversationId;

/// Result alias for a single backend request.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result alias for core session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Failure of one backend request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401: credential missing or deactivated.
    #[error("invalid credential: {detail}")]
    InvalidCredential { detail: String },

    /// 402: no credits remain.
    #[error("no credits remaining: {detail}")]
    QuotaExhausted { detail: String },

    /// 429: too many requests in the current window.
    #[error("rate limited: {detail}")]
    RateLimited {
        detail: String,
        retry_after: Option<Duration>,
    },

    /// 5xx from the backend.
    #[error("server error ({status}): {detail}")]
    ServerError { status: u16, detail: String },

    /// 404 for the addressed resource.
    #[error("not found: {detail}")]
    NotFound { detail: String },

    /// Any other non-success status.
    #[error("request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// Connection, timeout or body read failure.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL cannot address API paths.
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),

    /// Rejected locally before any request was made.
    #[error("{0}")]
    Invalid(String),
}

impl ApiError {
    /// Build the error for a non-success HTTP status.
    ///
    /// `body` is the raw response text; FastAPI-style `{"detail": ...}`
    /// bodies are unwrapped, anything else is kept verbatim.
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let detail = extract_detail(body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                body.trim().to_string()
            }
        });

        match CreditGate::classify(status) {
            Some(GateVerdict::InvalidCredential) => Self::InvalidCredential { detail },
            Some(GateVerdict::QuotaExhausted) => Self::QuotaExhausted { detail },
            Some(GateVerdict::RateLimited) => Self::RateLimited { detail, retry_after },
            Some(GateVerdict::ServerError) => Self::ServerError { status, detail },
            None if status == 404 => Self::NotFound { detail },
            None => Self::Rejected { status, detail },
        }
    }

    /// Credit-gate category of this error, if it carries one.
    #[must_use]
    pub const fn verdict(&self) -> Option<GateVerdict> {
        match self {
            Self::InvalidCredential { .. } => Some(GateVerdict::InvalidCredential),
            Self::QuotaExhausted { .. } => Some(GateVerdict::QuotaExhausted),
            Self::RateLimited { .. } => Some(GateVerdict::RateLimited),
            Self::ServerError { .. } => Some(GateVerdict::ServerError),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Backend-provided detail for status errors.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::InvalidCredential { detail }
            | Self::QuotaExhausted { detail }
            | Self::RateLimited { detail, .. }
            | Self::ServerError { detail, .. }
            | Self::NotFound { detail }
            | Self::Rejected { detail, .. } => Some(detail),
            _ => None,
        }
    }

    /// Whether a caller may retry the same request later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self.verdict() {
            Some(verdict) => verdict.is_retryable(),
            None => matches!(self, Self::Transport(_)),
        }
    }

    /// Text to show a user: the gate's notice when classified, else the error itself.
    pub fn user_message(&self) -> String {
        match self.verdict() {
            Some(verdict) => verdict.notice_text().to_string(),
            None => self.to_string(),
        }
    }
}

fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Failure of a core session operation.
///
/// Every variant is raised only after the affected state has been restored
/// to its last known-good value.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not create a conversation: {0}")]
    CreateFailed(#[source] ApiError),

    #[error("could not load {target}: {source}")]
    FetchFailed {
        target: FetchTarget,
        #[source]
        source: ApiError,
    },

    #[error("could not delete conversation {id}: {source}")]
    DeleteFailed {
        id: ConversationId,
        #[source]
        source: ApiError,
    },

    #[error("could not send the message to {id}: {source}")]
    SendFailed {
        id: ConversationId,
        #[source]
        source: ApiError,
    },
}

/// What a `FetchFailed` was trying to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget {
    ConversationList,
    Conversation(ConversationId),
}

impl fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConversationList => write!(f, "the conversation list"),
            Self::Conversation(id) => write!(f, "conversation {id}"),
        }
    }
}

impl SessionError {
    /// The backend error underneath this failure.
    #[must_use]
    pub const fn api_error(&self) -> &ApiError {
        match self {
            Self::CreateFailed(source)
            | Self::FetchFailed { source, .. }
            | Self::DeleteFailed { source, .. }
            | Self::SendFailed { source, .. } => source,
        }
    }

    /// User-visible failure category.
    ///
    /// Credit-gate statuses take precedence over the operation that hit
    /// them, so a 402 during a send reports `QuotaExhausted`.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        if let Some(verdict) = self.api_error().verdict() {
            return match verdict {
                GateVerdict::InvalidCredential => FailureKind::InvalidCredential,
                GateVerdict::QuotaExhausted => FailureKind::QuotaExhausted,
                GateVerdict::RateLimited => FailureKind::RateLimited,
                GateVerdict::ServerError => FailureKind::ServerError,
            };
        }
        match self {
            Self::CreateFailed(_) => FailureKind::CreateFailed,
            Self::FetchFailed { .. } => FailureKind::FetchFailed,
            Self::DeleteFailed { .. } => FailureKind::DeleteFailed,
            Self::SendFailed { .. } => FailureKind::SendFailed,
        }
    }
}

/// The failure taxonomy surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    CreateFailed,
    FetchFailed,
    DeleteFailed,
    SendFailed,
    InvalidCredential,
    QuotaExhausted,
    RateLimited,
    ServerError,
}

impl FailureKind {
    /// Short notification text for this category.
    pub fn notice_text(self) -> &'static str {
        match self {
            Self::CreateFailed => "Could not create a new conversation",
            Self::FetchFailed => "Could not load the conversation",
            Self::DeleteFailed => "Could not delete the conversation",
            Self::SendFailed => "Could not send the message",
            Self::InvalidCredential => GateVerdict::InvalidCredential.notice_text(),
            Self::QuotaExhausted => GateVerdict::QuotaExhausted.notice_text(),
            Self::RateLimited => GateVerdict::RateLimited.notice_text(),
            Self::ServerError => GateVerdict::ServerError.notice_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_unwraps_detail() {
        let err = ApiError::from_status(402, r#"{"detail":"Saldo agotado"}"#, None);
        match err {
            ApiError::QuotaExhausted { detail } => assert_eq!(detail, "Saldo agotado"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_status_keeps_plain_body() {
        let err = ApiError::from_status(400, "bad input", None);
        assert!(matches!(err, ApiError::Rejected { status: 400, ref detail } if detail == "bad input"));

        let err = ApiError::from_status(503, "", None);
        assert!(matches!(err, ApiError::ServerError { status: 503, ref detail } if detail == "HTTP 503"));
    }

    #[test]
    fn test_not_found_is_not_gated() {
        let err = ApiError::from_status(404, r#"{"detail":"missing"}"#, None);
        assert!(err.is_not_found());
        assert!(err.verdict().is_none());
    }

    #[test]
    fn test_kind_prefers_gate_category() {
        let id = ConversationId::from("c1");
        let quota = SessionError::SendFailed {
            id: id.clone(),
            source: ApiError::from_status(402, "", None),
        };
        assert_eq!(quota.kind(), FailureKind::QuotaExhausted);

        let plain = SessionError::SendFailed {
            id,
            source: ApiError::from_status(400, "", None),
        };
        assert_eq!(plain.kind(), FailureKind::SendFailed);
    }

    #[test]
    fn test_retryable() {
        let limited = ApiError::from_status(429, "", Some(Duration::from_secs(3)));
        assert!(limited.is_retryable());
        assert!(!ApiError::from_status(401, "", None).is_retryable());
        assert!(!ApiError::from_status(500, "", None).is_retryable());
    }
}
