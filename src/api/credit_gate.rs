//! Interpretation of quota and credential statuses returned by the backend.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

/// User-visible category for a gated HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateVerdict {
    /// Credential missing or deactivated.
    InvalidCredential,
    /// Zero credits remain; the user must buy a plan.
    QuotaExhausted,
    /// Too many requests in the current window.
    RateLimited,
    /// Backend failure.
    ServerError,
}

impl GateVerdict {
    /// Only rate limiting may be retried, and only by the caller.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited)
    }

    #[must_use]
    pub const fn notice_text(self) -> &'static str {
        match self {
            Self::InvalidCredential => "Your API key or session is invalid or deactivated",
            Self::QuotaExhausted => "You have no credits left. Purchase a plan to keep chatting",
            Self::RateLimited => "Too many requests. Wait a few seconds and try again",
            Self::ServerError => "The server failed to handle the request. Try again later",
        }
    }
}

/// Stateless classifier shared by the session and direct API callers.
pub struct CreditGate;

impl CreditGate {
    /// Map an HTTP status to its gate category, if any.
    #[must_use]
    pub const fn classify(status: u16) -> Option<GateVerdict> {
        match status {
            401 => Some(GateVerdict::InvalidCredential),
            402 => Some(GateVerdict::QuotaExhausted),
            429 => Some(GateVerdict::RateLimited),
            500..=599 => Some(GateVerdict::ServerError),
            _ => None,
        }
    }

    /// Delay advertised by a `Retry-After` header given in seconds.
    ///
    /// HTTP-date values are ignored.
    pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
        headers
            .get(RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_classify_gated_statuses() {
        assert_eq!(CreditGate::classify(401), Some(GateVerdict::InvalidCredential));
        assert_eq!(CreditGate::classify(402), Some(GateVerdict::QuotaExhausted));
        assert_eq!(CreditGate::classify(429), Some(GateVerdict::RateLimited));
        assert_eq!(CreditGate::classify(500), Some(GateVerdict::ServerError));
        assert_eq!(CreditGate::classify(503), Some(GateVerdict::ServerError));
    }

    #[test]
    fn test_classify_passes_other_statuses() {
        for status in [200, 204, 400, 403, 404, 422] {
            assert_eq!(CreditGate::classify(status), None, "status {status}");
        }
    }

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(GateVerdict::RateLimited.is_retryable());
        assert!(!GateVerdict::QuotaExhausted.is_retryable());
        assert!(!GateVerdict::InvalidCredential.is_retryable());
        assert!(!GateVerdict::ServerError.is_retryable());
    }

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(CreditGate::retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(CreditGate::retry_after(&headers), Some(Duration::from_secs(12)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(CreditGate::retry_after(&headers), None);
    }
}
