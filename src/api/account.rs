//! Account, billing-catalog and direct-API endpoints.
//!
//! These are plain request/response calls with no session state; quota and
//! credential failures are classified the same way as chat calls.

use reqwest::Method;

use super::client::HttpBackend;
use super::types::{
    ApiKeyInfo, CheckoutBody, CheckoutSession, CreateApiKeyBody, DirectChatBody, DirectChatReply,
    FeedbackBody, FeedbackKind, HealthStatus, Plan, PlansResponse, Settings, UpdateProfileBody, Usage,
    UserProfile,
};
use crate::error::{ApiError, ApiResult};
use crate::session::{MessageId, SessionContext};

/// Accepted system prompt length, in characters.
pub const SYSTEM_PROMPT_LIMITS: (usize, usize) = (10, 2000);

impl HttpBackend {
    pub async fn profile(&self, ctx: &SessionContext) -> ApiResult<UserProfile> {
        Self::execute(self.request(Method::GET, &["auth", "me"], Some(ctx))).await
    }

    /// Change the account's display name.
    pub async fn update_profile(&self, ctx: &SessionContext, name: &str) -> ApiResult<UserProfile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::Invalid("name must not be empty".to_string()));
        }
        let builder = self
            .request(Method::PUT, &["users", "profile"], Some(ctx))
            .json(&UpdateProfileBody { name });
        Self::execute(builder).await
    }

    pub async fn settings(&self, ctx: &SessionContext) -> ApiResult<Settings> {
        Self::execute(self.request(Method::GET, &["settings"], Some(ctx))).await
    }

    /// Replace the system prompt used for this account's conversations.
    pub async fn update_settings(&self, ctx: &SessionContext, system_prompt: &str) -> ApiResult<Settings> {
        validate_system_prompt(system_prompt)?;
        let body = Settings {
            system_prompt: system_prompt.to_string(),
        };
        Self::execute(self.request(Method::PUT, &["settings"], Some(ctx)).json(&body)).await
    }

    pub async fn usage(&self, ctx: &SessionContext) -> ApiResult<Usage> {
        Self::execute(self.request(Method::GET, &["usage"], Some(ctx))).await
    }

    /// Public plan catalog, cheapest first.
    pub async fn plans(&self) -> ApiResult<Vec<Plan>> {
        let response: PlansResponse = Self::execute(self.request(Method::GET, &["plans"], None)).await?;
        Ok(response.into_sorted())
    }

    pub async fn api_keys(&self, ctx: &SessionContext) -> ApiResult<Vec<ApiKeyInfo>> {
        Self::execute(self.request(Method::GET, &["api-keys"], Some(ctx))).await
    }

    /// Create a named API key. The full key is only visible in this response.
    pub async fn create_api_key(&self, ctx: &SessionContext, name: &str) -> ApiResult<ApiKeyInfo> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::Invalid("API key name must not be empty".to_string()));
        }
        let builder = self
            .request(Method::POST, &["api-keys"], Some(ctx))
            .json(&CreateApiKeyBody { name });
        Self::execute(builder).await
    }

    /// Start a hosted checkout for `plan_id`; returns the page to open.
    pub async fn create_checkout(
        &self,
        ctx: &SessionContext,
        plan_id: &str,
        origin_url: &str,
    ) -> ApiResult<CheckoutSession> {
        let builder = self
            .request(Method::POST, &["stripe", "create-checkout-session"], Some(ctx))
            .json(&CheckoutBody { plan_id, origin_url });
        Self::execute(builder).await
    }

    /// Rate an assistant reply, optionally with a corrected answer.
    pub async fn submit_feedback(
        &self,
        ctx: &SessionContext,
        message_id: &MessageId,
        kind: FeedbackKind,
        correction: Option<&str>,
    ) -> ApiResult<()> {
        if message_id.is_local() {
            return Err(ApiError::Invalid(
                "feedback needs a message confirmed by the server".to_string(),
            ));
        }
        let body = FeedbackBody {
            message_id: message_id.as_str(),
            feedback_type: kind,
            correction: correction.map(str::trim).filter(|c| !c.is_empty()),
        };
        Self::execute_empty(self.request(Method::POST, &["chat", "feedback"], Some(ctx)).json(&body)).await
    }

    pub async fn health(&self) -> ApiResult<HealthStatus> {
        Self::execute(self.request(Method::GET, &["health"], None)).await
    }

    /// One-shot completion through the public developer endpoint.
    ///
    /// Expects an API-key context; debits one credit on success.
    pub async fn direct_chat(
        &self,
        ctx: &SessionContext,
        message: &str,
        system_prompt: Option<&str>,
    ) -> ApiResult<DirectChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ApiError::Invalid("message must not be empty".to_string()));
        }
        let builder = self
            .request(Method::POST, &["v1", "chat"], Some(ctx))
            .json(&DirectChatBody { message, system_prompt });
        Self::execute(builder).await
    }
}

/// Check a system prompt against the backend's length limits.
pub fn validate_system_prompt(prompt: &str) -> ApiResult<()> {
    let (min, max) = SYSTEM_PROMPT_LIMITS;
    let len = prompt.chars().count();
    if len < min || len > max {
        return Err(ApiError::Invalid(format!(
            "system prompt must be between {min} and {max} characters (got {len})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_bounds() {
        assert!(validate_system_prompt("too short").is_err());
        assert!(validate_system_prompt("exactly10!").is_ok());
        assert!(validate_system_prompt(&"x".repeat(2000)).is_ok());
        assert!(validate_system_prompt(&"x".repeat(2001)).is_err());
    }
}
