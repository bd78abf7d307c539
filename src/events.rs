use crate::error::{FailureKind, SessionError};
use crate::session::{ConversationId, Message, MessageId};

/// Session state changes, emitted so a front end can re-render
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The conversation list was replaced by a refresh
    ConversationsReplaced { count: usize },

    /// A new conversation was created and made active
    ConversationCreated { id: ConversationId },

    /// The active conversation changed; its log is empty until history loads
    ConversationSelected { id: ConversationId },

    /// History for the active conversation replaced the log
    HistoryLoaded { id: ConversationId, messages: usize },

    /// A conversation was removed from the list
    ConversationDeleted { id: ConversationId, was_active: bool },

    /// A message was added to the active log
    MessageAppended {
        conversation_id: ConversationId,
        message: Message,
    },

    /// An optimistic message was removed after a failed or cancelled send
    MessageRolledBack {
        conversation_id: ConversationId,
        message_id: MessageId,
    },

    /// Transient user notification
    Notice(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// One user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub kind: Option<FailureKind>,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            kind: None,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl From<&SessionError> for Notice {
    fn from(error: &SessionError) -> Self {
        let kind = error.kind();
        let text = match (kind, error.api_error().detail()) {
            // the backend says which credential was rejected and why
            (FailureKind::InvalidCredential, Some(detail)) => format!("{}: {}", kind.notice_text(), detail),
            _ => kind.notice_text().to_string(),
        };
        Self {
            level: NoticeLevel::Error,
            kind: Some(kind),
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn test_notice_uses_gate_text() {
        let error = SessionError::SendFailed {
            id: ConversationId::from("c1"),
            source: ApiError::from_status(402, "", None),
        };
        let notice = Notice::from(&error);

        assert!(notice.is_error());
        assert_eq!(notice.kind, Some(FailureKind::QuotaExhausted));
        assert!(notice.text.contains("Purchase a plan"));
    }

    #[test]
    fn test_invalid_credential_notice_carries_detail() {
        let error = SessionError::FetchFailed {
            target: crate::error::FetchTarget::ConversationList,
            source: ApiError::from_status(401, r#"{"detail":"Token expirado"}"#, None),
        };
        let notice = Notice::from(&error);

        assert_eq!(notice.kind, Some(FailureKind::InvalidCredential));
        assert!(notice.text.starts_with(FailureKind::InvalidCredential.notice_text()));
        assert!(notice.text.ends_with("Token expirado"));
    }

    #[test]
    fn test_notice_falls_back_to_operation_text() {
        let error = SessionError::CreateFailed(ApiError::from_status(400, "", None));
        assert_eq!(Notice::from(&error).text, FailureKind::CreateFailed.notice_text());
    }
}
