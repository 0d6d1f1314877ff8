//! Relay configuration, loaded from TOML.
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [[webhooks]]
//! id = "github"
//! target_url = "https://example.com/hook"
//!   [[webhooks.mappings]]
//!   source_field = "user.name"
//!   target_field = "author"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::MappingRule;
use crate::errors::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub forward: ForwardConfig,
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Ceiling for one whole delivery attempt.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("webhook-relay/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// Delivery records go to this JSON-lines file when set, to the log otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordsConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub target_url: String,
    /// Applied in order. Empty means the payload is forwarded unchanged.
    #[serde(default)]
    pub mappings: Vec<MappingRule>,
}

impl RelayConfig {
    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.forward.timeout_secs == 0 {
            return Err(ConfigError::Invalid("forward.timeout_secs must be positive".into()));
        }
        let mut seen = HashSet::new();
        for hook in &self.webhooks {
            if hook.id.trim().is_empty() {
                return Err(ConfigError::Invalid("webhook id cannot be empty".into()));
            }
            if !seen.insert(hook.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate webhook id '{}'", hook.id)));
            }
            match reqwest::Url::parse(&hook.target_url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "webhook '{}': target_url '{}' is not an http(s) URL",
                        hook.id, hook.target_url
                    )))
                }
            }
            if hook.mappings.iter().filter(|m| m.is_template()).count() > 1 {
                return Err(ConfigError::Invalid(format!(
                    "webhook '{}': at most one template mapping is allowed",
                    hook.id
                )));
            }
        }
        Ok(())
    }

    pub fn webhook(&self, id: &str) -> Option<&WebhookConfig> {
        self.webhooks.iter().find(|w| w.id == id)
    }
}
