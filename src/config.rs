use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::session::SessionContext;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the REST API, e.g. `https://brainyx.example/api`
    pub api_base_url: String,

    /// Bearer token for the chat endpoints
    pub access_token: Option<String>,

    /// Developer API key, used when no token is set
    pub api_key: Option<String>,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// Put the text of a failed send back into the input line
    pub restore_input_on_failure: bool,

    /// Open the newest conversation on start
    pub auto_select_first: bool,

    /// tracing filter used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            access_token: None,
            api_key: None,
            request_timeout_secs: 60,
            restore_input_on_failure: false,
            auto_select_first: true,
            log_filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// `~/.brainyx`
    pub fn home_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".brainyx"))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    /// Load `~/.brainyx/config.toml`, then apply environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from `path` (defaults when it does not exist), then apply
    /// environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parse `path` without consulting the environment
    pub fn read_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Override fields from `BRAINYX_API_URL`, `BRAINYX_TOKEN` and
    /// `BRAINYX_API_KEY` as returned by `lookup`. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("BRAINYX_API_URL") {
            self.api_base_url = url;
        }
        if let Some(token) = lookup("BRAINYX_TOKEN") {
            self.access_token = Some(token);
        }
        if let Some(key) = lookup("BRAINYX_API_KEY") {
            self.api_key = Some(key);
        }
    }

    /// Save to `~/.brainyx/config.toml`
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(Self::home_dir()?).context("Failed to create .brainyx directory")?;
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Replace the stored credentials that are given, keeping the others.
    pub fn set_credentials(&mut self, access_token: Option<String>, api_key: Option<String>) {
        if let Some(token) = access_token {
            self.access_token = Some(token);
        }
        if let Some(key) = api_key {
            self.api_key = Some(key);
        }
    }

    /// Credential for chat calls: the bearer token when set, else the API key
    pub fn session_context(&self) -> Result<SessionContext> {
        let token = self.access_token.as_deref().map(str::trim).filter(|t| !t.is_empty());
        if let Some(token) = token {
            return Ok(SessionContext::bearer(token));
        }

        let key = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty());
        if let Some(key) = key {
            return Ok(SessionContext::api_key(key));
        }

        bail!(
            "No credential configured. Set access_token or api_key in ~/.brainyx/config.toml, \
             or export BRAINYX_TOKEN / BRAINYX_API_KEY"
        )
    }

    /// API-key credential for the developer endpoint
    pub fn api_key_context(&self) -> Result<SessionContext> {
        match self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Ok(SessionContext::api_key(key)),
            None => bail!("No API key configured. Set api_key or export BRAINYX_API_KEY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Credential;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::read_file(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert!(config.auto_select_first);
        assert!(!config.restore_input_on_failure);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config {
            access_token: Some("tok".to_string()),
            request_timeout_secs: 5,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::read_file(&path).unwrap(), config);
    }

    #[test]
    fn test_set_credentials_keeps_unrelated_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_base_url = \"https://chat.example/api\"\napi_key = \"byx_old\"\n").unwrap();

        let mut config = Config::read_file(&path).unwrap();
        config.set_credentials(Some("tok".to_string()), None);
        config.save_to(&path).unwrap();

        let saved = Config::read_file(&path).unwrap();
        assert_eq!(saved.api_base_url, "https://chat.example/api");
        assert_eq!(saved.access_token.as_deref(), Some("tok"));
        assert_eq!(saved.api_key.as_deref(), Some("byx_old"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_base_url = \"https://chat.example/api\"\n").unwrap();

        let config = Config::read_file(&path).unwrap();
        assert_eq!(config.api_base_url, "https://chat.example/api");
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_base_url = [").unwrap();

        assert!(Config::read_file(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|name| match name {
            "BRAINYX_API_URL" => Some("https://other/api".to_string()),
            "BRAINYX_TOKEN" => Some("env-token".to_string()),
            "BRAINYX_API_KEY" => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.api_base_url, "https://other/api");
        assert_eq!(config.access_token.as_deref(), Some("env-token"));
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn test_session_context_prefers_token() {
        let config = Config {
            access_token: Some("tok".to_string()),
            api_key: Some("key".to_string()),
            ..Config::default()
        };
        let ctx = config.session_context().unwrap();
        assert!(matches!(ctx.credential, Credential::Bearer(ref t) if t == "tok"));

        let config = Config {
            access_token: Some(String::new()),
            api_key: Some("key".to_string()),
            ..Config::default()
        };
        let ctx = config.session_context().unwrap();
        assert!(matches!(ctx.credential, Credential::ApiKey(ref k) if k == "key"));
    }

    #[test]
    fn test_session_context_without_credential() {
        let err = Config::default().session_context().unwrap_err();
        assert!(err.to_string().contains("BRAINYX_TOKEN"));
    }
}
