use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::credit_gate::CreditGate;
use super::types::{ConversationDto, MessageDto, SendMessageBody};
use super::{ApiFuture, ChatBackend};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::session::{ConversationId, SessionContext};

/// reqwest-backed client for the Brainyx REST API.
#[derive(Clone)]
pub struct HttpBackend {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: &Config) -> ApiResult<Self> {
        Self::with_base_url(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Build a client rooted at `base_url` (e.g. `https://host/api`).
    pub fn with_base_url(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(format!("{base_url} cannot hold API paths")));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for the path `segments` under the base URL.
    ///
    /// Each segment is percent-encoded, so ids cannot escape their slot.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Start a request, attaching the credential when one is given.
    pub(crate) fn request(
        &self,
        method: Method,
        segments: &[&str],
        ctx: Option<&SessionContext>,
    ) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!("{} {}", method, url);

        let mut builder = self.client.request(method, url);
        if let Some(ctx) = ctx {
            let (name, value) = ctx.credential.header();
            builder = builder.header(name, value);
        }
        builder
    }

    /// Send and decode a JSON response body.
    pub(crate) async fn execute<T: DeserializeOwned>(builder: RequestBuilder) -> ApiResult<T> {
        let response = Self::checked(builder.send().await?).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Send and discard the response body.
    pub(crate) async fn execute_empty(builder: RequestBuilder) -> ApiResult<()> {
        Self::checked(builder.send().await?).await?;
        Ok(())
    }

    /// Turn non-success statuses into classified errors.
    async fn checked(response: Response) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = CreditGate::retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        debug!("request failed with {}: {}", status, body);
        Err(ApiError::from_status(status.as_u16(), &body, retry_after))
    }
}

impl ChatBackend for HttpBackend {
    fn list_conversations<'a>(&'a self, ctx: &'a SessionContext) -> ApiFuture<'a, Vec<ConversationDto>> {
        Box::pin(async move {
            let builder = self.request(Method::GET, &["chat", "conversations"], Some(ctx));
            Self::execute(builder).await
        })
    }

    fn create_conversation<'a>(&'a self, ctx: &'a SessionContext) -> ApiFuture<'a, ConversationDto> {
        Box::pin(async move {
            let builder = self.request(Method::POST, &["chat", "conversations"], Some(ctx));
            Self::execute(builder).await
        })
    }

    fn get_conversation<'a>(
        &'a self,
        ctx: &'a SessionContext,
        id: &'a ConversationId,
    ) -> ApiFuture<'a, ConversationDto> {
        Box::pin(async move {
            let builder = self.request(
                Method::GET,
                &["chat", "conversations", id.as_str()],
                Some(ctx),
            );
            Self::execute(builder).await
        })
    }

    fn delete_conversation<'a>(&'a self, ctx: &'a SessionContext, id: &'a ConversationId) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let builder = self.request(
                Method::DELETE,
                &["chat", "conversations", id.as_str()],
                Some(ctx),
            );
            Self::execute_empty(builder).await
        })
    }

    fn send_message<'a>(
        &'a self,
        ctx: &'a SessionContext,
        id: &'a ConversationId,
        content: &'a str,
    ) -> ApiFuture<'a, MessageDto> {
        Box::pin(async move {
            let builder = self
                .request(
                    Method::POST,
                    &["chat", "conversations", id.as_str(), "messages"],
                    Some(ctx),
                )
                .json(&SendMessageBody { content });
            Self::execute(builder).await
        })
    }
}
