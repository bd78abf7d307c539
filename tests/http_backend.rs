use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use brainyx::api::ChatBackend;
use brainyx::api::types::FeedbackKind;
use brainyx::error::ApiError;
use brainyx::session::{ConversationId, MessageId, Role, SessionContext};
use brainyx::HttpBackend;

/// What the responder saw of the single request it served.
#[derive(Debug)]
struct Recorded {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Recorded {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serve exactly one HTTP/1.1 request with a canned response.
async fn respond_once(status: u16, extra_headers: &str, body: &str) -> (HttpBackend, JoinHandle<Recorded>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n{extra_headers}\r\n{body}",
        body.len()
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        let head_end = loop {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
        let mut lines = head.split("\r\n");
        let mut request_line = lines.next().unwrap().split(' ');
        let method = request_line.next().unwrap().to_string();
        let path = request_line.next().unwrap().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
            .collect();

        let content_length = headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
            .map(|(_, v)| v.parse::<usize>().unwrap())
            .unwrap_or(0);
        let mut body = raw[head_end..].to_vec();
        while body.len() < content_length {
            let n = socket.read(&mut buf).await.unwrap();
            body.extend_from_slice(&buf[..n]);
        }

        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        Recorded {
            method,
            path,
            headers,
            body: String::from_utf8(body).unwrap(),
        }
    });

    let backend = HttpBackend::with_base_url(&format!("http://{addr}/api"), Duration::from_secs(5)).unwrap();
    (backend, handle)
}

fn bearer() -> SessionContext {
    SessionContext::bearer("tok-123")
}

#[tokio::test]
async fn test_list_conversations_sends_bearer() {
    let body = r#"[{"id":"c1","user_id":"u1","messages":[{"id":"m1","role":"user","content":"hi","timestamp":"2025-01-01T00:00:00"}],"created_at":"2025-01-01T00:00:00","updated_at":"2025-01-01T00:00:00"}]"#;
    let (backend, server) = respond_once(200, "", body).await;

    let conversations = backend.list_conversations(&bearer()).await.unwrap();
    let request = server.await.unwrap();

    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/api/chat/conversations");
    assert_eq!(request.header("authorization"), Some("Bearer tok-123"));
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].summary().preview(), "hi");
}

#[tokio::test]
async fn test_send_message_posts_content_with_api_key() {
    let body = r#"{"id":"m2","role":"assistant","content":"Hello!","timestamp":"2025-01-01T00:00:01"}"#;
    let (backend, server) = respond_once(200, "", body).await;
    let ctx = SessionContext::api_key("byx_abc");

    let reply = backend
        .send_message(&ctx, &ConversationId::from("c1"), "hi there")
        .await
        .unwrap();
    let request = server.await.unwrap();

    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/api/chat/conversations/c1/messages");
    assert_eq!(request.header("x-api-key"), Some("byx_abc"));
    assert_eq!(request.header("authorization"), None);
    let sent: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(sent, serde_json::json!({ "content": "hi there" }));
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, "Hello!");
}

#[tokio::test]
async fn test_payment_required_is_quota_exhausted() {
    let (backend, _server) = respond_once(402, "", r#"{"detail":"No credits remaining"}"#).await;

    let err = backend.create_conversation(&bearer()).await.unwrap_err();

    match err {
        ApiError::QuotaExhausted { detail } => assert_eq!(detail, "No credits remaining"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let (backend, _server) = respond_once(429, "retry-after: 7\r\n", r#"{"detail":"slow down"}"#).await;

    let err = backend
        .send_message(&bearer(), &ConversationId::from("c1"), "again")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ApiError::RateLimited { retry_after: Some(wait), .. } if wait == Duration::from_secs(7)
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unauthorized_and_server_errors() {
    let (backend, _server) = respond_once(401, "", r#"{"detail":"Invalid API key"}"#).await;
    let err = backend.list_conversations(&bearer()).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidCredential { .. }));
    assert!(!err.is_retryable());

    let (backend, _server) = respond_once(503, "", "").await;
    let err = backend.list_conversations(&bearer()).await.unwrap_err();
    assert!(matches!(err, ApiError::ServerError { status: 503, ref detail } if detail == "HTTP 503"));
}

#[tokio::test]
async fn test_delete_reports_not_found() {
    let (backend, server) = respond_once(404, "", r#"{"detail":"Conversation not found"}"#).await;

    let err = backend
        .delete_conversation(&bearer(), &ConversationId::from("gone"))
        .await
        .unwrap_err();
    let request = server.await.unwrap();

    assert_eq!(request.method, "DELETE");
    assert_eq!(request.path, "/api/chat/conversations/gone");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_undecodable_body() {
    let (backend, _server) = respond_once(200, "", "<html>oops</html>").await;

    let err = backend.list_conversations(&bearer()).await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn test_plans_are_public_and_sorted() {
    let body = r#"{"plans":{"pro":{"name":"Pro","price":19.99,"credits":1000},"basic":{"name":"Basic","price":4.99,"credits":100}}}"#;
    let (backend, server) = respond_once(200, "", body).await;

    let plans = backend.plans().await.unwrap();
    let request = server.await.unwrap();

    assert_eq!(request.path, "/api/plans");
    assert_eq!(request.header("authorization"), None);
    let keys: Vec<&str> = plans.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, ["basic", "pro"]);
}

#[tokio::test]
async fn test_direct_chat_uses_developer_endpoint() {
    let (backend, server) = respond_once(200, "", r#"{"response":"42","credits_remaining":9}"#).await;
    let ctx = SessionContext::api_key("byx_key");

    let reply = backend.direct_chat(&ctx, "meaning of life?", Some("Be brief.")).await.unwrap();
    let request = server.await.unwrap();

    assert_eq!(request.path, "/api/v1/chat");
    let sent: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(sent["message"], "meaning of life?");
    assert_eq!(sent["system_prompt"], "Be brief.");
    assert_eq!(reply.response, "42");
    assert_eq!(reply.credits_remaining, Some(9));
}

#[tokio::test]
async fn test_feedback_body() {
    let (backend, server) = respond_once(200, "", r#"{"message":"ok"}"#).await;

    backend
        .submit_feedback(&bearer(), &MessageId::from("m9"), FeedbackKind::Negative, Some("  Lima, Peru "))
        .await
        .unwrap();
    let request = server.await.unwrap();

    assert_eq!(request.path, "/api/chat/feedback");
    let sent: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(
        sent,
        serde_json::json!({ "message_id": "m9", "feedback_type": "negative", "correction": "Lima, Peru" })
    );
}

#[tokio::test]
async fn test_update_profile_puts_trimmed_name() {
    let body = r#"{"id":"u1","name":"Ana","email":"ana@example.com","masked_email":"a**@example.com","credits":5,"plan":"free"}"#;
    let (backend, server) = respond_once(200, "", body).await;

    let profile = backend.update_profile(&bearer(), "  Ana ").await.unwrap();
    let request = server.await.unwrap();

    assert_eq!(request.method, "PUT");
    assert_eq!(request.path, "/api/users/profile");
    assert_eq!(request.header("authorization"), Some("Bearer tok-123"));
    let sent: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(sent, serde_json::json!({ "name": "Ana" }));
    assert_eq!(profile.name, "Ana");
    assert_eq!(profile.credits, Some(5));
}

#[tokio::test]
async fn test_local_validation_skips_the_network() {
    let backend = HttpBackend::with_base_url("http://127.0.0.1:9/api", Duration::from_secs(1)).unwrap();

    assert!(matches!(
        backend.update_settings(&bearer(), "short").await,
        Err(ApiError::Invalid(_))
    ));
    assert!(matches!(
        backend.create_api_key(&bearer(), "   ").await,
        Err(ApiError::Invalid(_))
    ));
    assert!(matches!(
        backend.update_profile(&bearer(), "").await,
        Err(ApiError::Invalid(_))
    ));
    assert!(matches!(
        backend
            .submit_feedback(&bearer(), &MessageId::local(), FeedbackKind::Positive, None)
            .await,
        Err(ApiError::Invalid(_))
    ));
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpBackend::with_base_url(&format!("http://{addr}/api"), Duration::from_secs(2)).unwrap();
    let err = backend.health().await.unwrap_err();

    assert!(matches!(err, ApiError::Transport(_)));
    assert!(err.is_retryable());
}
