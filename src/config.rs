//! Client configuration.
//!
//! Settings are layered, later layers winning:
//! 1. `taskboard.toml` (by default `<config dir>/taskboard/taskboard.toml`)
//! 2. `.env` and the process environment
//! 3. CLI flags
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! api_url = "http://localhost:8080"
//! ws_url = "ws://localhost:8080/ws"   # derived from api_url when omitted
//! token = "..."                        # prefer TASKBOARD_TOKEN
//! request_timeout_secs = 15
//!
//! [reconnect]
//! max_attempts = 0                     # 0 disables reconnection
//! initial_delay_ms = 500
//! max_delay_ms = 30000
//!
//! [logging]
//! format = "compact"
//! level = "warn"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::logging::LogFormat;
use crate::supervisor::ReconnectPolicy;

pub const CONFIG_FILE_NAME: &str = "taskboard.toml";

pub const ENV_API_URL: &str = "TASKBOARD_API_URL";
pub const ENV_WS_URL: &str = "TASKBOARD_WS_URL";
pub const ENV_TOKEN: &str = "TASKBOARD_TOKEN";
pub const ENV_LOG_FORMAT: &str = "TASKBOARD_LOG_FORMAT";

/// Bearer credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: None,
            token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}

/// The taskboard.toml file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskboardToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl TaskboardToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse taskboard.toml")
    }

    /// Defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize taskboard.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// Flags that override file and environment settings.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_url: Option<String>,
    pub ws_url: Option<String>,
    pub token: Option<String>,
    pub log_format: Option<LogFormat>,
    pub reconnect_attempts: Option<u32>,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub ws_url: Option<String>,
    pub credential: Option<Credential>,
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub log_format: LogFormat,
    pub log_level: String,
    /// File the first layer was read from, if it existed.
    pub source: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_toml(TaskboardToml::default(), None)
    }
}

impl ClientConfig {
    /// `<config dir>/taskboard/taskboard.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("taskboard").join(CONFIG_FILE_NAME))
    }

    fn from_toml(toml: TaskboardToml, source: Option<PathBuf>) -> Self {
        Self {
            api_url: toml.server.api_url,
            ws_url: toml.server.ws_url,
            credential: toml.server.token.and_then(Credential::new),
            request_timeout: Duration::from_secs(toml.server.request_timeout_secs),
            reconnect: toml.reconnect,
            log_format: toml.logging.format,
            log_level: toml.logging.level,
            source,
        }
    }

    /// File layer then environment layer. `path` defaults to
    /// [`ClientConfig::default_path`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path(),
        };
        let mut config = match &path {
            Some(p) => {
                let toml = TaskboardToml::load_or_default(p)?;
                let source = p.exists().then(|| p.clone());
                Self::from_toml(toml, source)
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Environment layer, through `lookup` so tests need not touch the
    /// process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_url = url;
        }
        if let Some(url) = lookup(ENV_WS_URL).filter(|v| !v.is_empty()) {
            self.ws_url = Some(url);
        }
        if let Some(credential) = lookup(ENV_TOKEN).and_then(Credential::new) {
            self.credential = Some(credential);
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT).filter(|v| !v.is_empty()) {
            self.log_format = format
                .parse()
                .map_err(|e: String| anyhow!(e))
                .with_context(|| format!("Invalid {}", ENV_LOG_FORMAT))?;
        }
        Ok(())
    }

    pub fn with_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(url) = overrides.api_url {
            self.api_url = url;
        }
        if let Some(url) = overrides.ws_url {
            self.ws_url = Some(url);
        }
        if let Some(credential) = overrides.token.and_then(Credential::new) {
            self.credential = Some(credential);
        }
        if let Some(format) = overrides.log_format {
            self.log_format = format;
        }
        if let Some(attempts) = overrides.reconnect_attempts {
            self.reconnect.max_attempts = attempts;
        }
        self
    }

    /// The event stream endpoint: the explicit `ws_url`, or the API URL
    /// with `http→ws` / `https→wss` and path `/ws`.
    pub fn stream_url(&self) -> Result<String> {
        if let Some(url) = &self.ws_url {
            return Ok(url.clone());
        }
        let mut url = Url::parse(&self.api_url)
            .with_context(|| format!("Invalid API URL: {}", self.api_url))?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(anyhow!("Unsupported API URL scheme '{}'", other)),
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow!("Cannot derive stream URL from {}", self.api_url))?;
        url.set_path("/ws");
        url.set_query(None);
        Ok(url.to_string())
    }

    /// Non-fatal problems worth telling the user about.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = Url::parse(&self.api_url) {
            warnings.push(format!("Invalid api_url '{}': {}", self.api_url, e));
        }
        if let Some(ws) = &self.ws_url
            && !(ws.starts_with("ws://") || ws.starts_with("wss://"))
        {
            warnings.push(format!("ws_url '{}' should start with ws:// or wss://", ws));
        }
        if self.credential.is_none() {
            warnings.push(format!(
                "No credential configured; set {} or server.token",
                ENV_TOKEN
            ));
        }
        if self.request_timeout.is_zero() {
            warnings.push("request_timeout_secs is 0; every request will time out".to_string());
        }
        warnings.extend(self.reconnect.validate());
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = TempDir::new().unwrap();
        let toml = TaskboardToml::load_or_default(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(toml.server.api_url, "http://localhost:8080");
        assert_eq!(toml.server.request_timeout_secs, 15);
        assert_eq!(toml.reconnect.max_attempts, 0);
    }

    #[test]
    fn test_parse_full_file() {
        let toml = TaskboardToml::parse(
            r#"
            [server]
            api_url = "https://boards.example.com"
            token = "abc"

            [reconnect]
            max_attempts = 5
            initial_delay_ms = 100

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        let config = ClientConfig::from_toml(toml, None);
        assert_eq!(config.api_url, "https://boards.example.com");
        assert_eq!(config.credential.as_ref().map(Credential::expose), Some("abc"));
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.initial_delay_ms, 100);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut toml = TaskboardToml::default();
        toml.server.api_url = "http://10.0.0.2:9000".to_string();
        toml.save(&path).unwrap();

        let config = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert!(!config.api_url.is_empty());
    }

    #[test]
    fn test_env_overrides_file_and_cli_overrides_env() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "http://env:1"),
            (ENV_TOKEN, "env-token"),
            (ENV_LOG_FORMAT, "pretty"),
        ]);
        let mut config = ClientConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.api_url, "http://env:1");
        assert_eq!(config.log_format, LogFormat::Pretty);

        let config = config.with_overrides(CliOverrides {
            api_url: Some("http://cli:2".into()),
            reconnect_attempts: Some(3),
            ..CliOverrides::default()
        });
        assert_eq!(config.api_url, "http://cli:2");
        assert_eq!(config.credential.as_ref().map(Credential::expose), Some("env-token"));
        assert_eq!(config.reconnect.max_attempts, 3);
    }

    #[test]
    fn test_invalid_env_log_format_is_error() {
        let mut config = ClientConfig::default();
        let err = config
            .apply_env(|k| (k == ENV_LOG_FORMAT).then(|| "xml".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_LOG_FORMAT));
    }

    #[test]
    fn test_stream_url_derivation() {
        let mut config = ClientConfig {
            api_url: "https://boards.example.com/".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(config.stream_url().unwrap(), "wss://boards.example.com/ws");

        config.api_url = "http://localhost:8080".to_string();
        assert_eq!(config.stream_url().unwrap(), "ws://localhost:8080/ws");

        config.ws_url = Some("ws://other:1/stream".to_string());
        assert_eq!(config.stream_url().unwrap(), "ws://other:1/stream");
    }

    #[test]
    fn test_credential_is_redacted_and_trimmed() {
        let credential = Credential::new("  secret \n").unwrap();
        assert_eq!(credential.expose(), "secret");
        assert!(!format!("{credential:?}").contains("secret"));
        assert!(Credential::new("   ").is_none());
    }

    #[test]
    fn test_validate_warnings() {
        let config = ClientConfig {
            api_url: "not a url".to_string(),
            ws_url: Some("http://x".to_string()),
            request_timeout: Duration::ZERO,
            ..ClientConfig::default()
        };
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("api_url")));
        assert!(warnings.iter().any(|w| w.contains("ws_url")));
        assert!(warnings.iter().any(|w| w.contains(ENV_TOKEN)));
        assert!(warnings.iter().any(|w| w.contains("request_timeout_secs")));
    }
}
