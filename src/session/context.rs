use std::fmt;

/// How requests authenticate against the backend.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Session token from a web login, sent as `Authorization: Bearer`.
    Bearer(String),
    /// Developer API key (`byx_...`), sent as `X-API-Key`.
    ApiKey(String),
}

impl Credential {
    /// Header name and value carrying this credential.
    pub fn header(&self) -> (&'static str, String) {
        match self {
            Credential::Bearer(token) => ("Authorization", format!("Bearer {token}")),
            Credential::ApiKey(key) => ("X-API-Key", key.clone()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Bearer(_) => f.write_str("Bearer(***)"),
            Credential::ApiKey(key) => {
                let shown: String = key.chars().take(4).collect();
                write!(f, "ApiKey({shown}***)")
            }
        }
    }
}

/// Per-user context passed to every core operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub credential: Credential,
}

impl SessionContext {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new(Credential::Bearer(token.into()))
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Self::new(Credential::ApiKey(key.into()))
    }
}
