//! deploybot.toml configuration.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Secrets can come from the environment instead of the
//! file: `DEPLOYBOT_SLACK_TOKEN` and `DEPLOYBOT_VERIFICATION_TOKEN`
//! override their `[slack]` counterparts.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const SLACK_TOKEN_ENV: &str = "DEPLOYBOT_SLACK_TOKEN";
pub const VERIFICATION_TOKEN_ENV: &str = "DEPLOYBOT_VERIFICATION_TOKEN";

/// File name of the deploy store inside `data_dir`.
const DB_FILE: &str = "deploys.redb";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Address the slash command endpoint listens on.
    pub listen: SocketAddr,
    /// Directory holding the deploy store.
    pub data_dir: PathBuf,
    pub slack: SlackConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SlackConfig {
    /// Web API token used to update channel topics.
    pub token: Option<String>,
    /// Token Slack sends with each slash command.
    pub verification_token: Option<String>,
    /// Web API base URL, if not slack.com.
    pub api_url: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: PathBuf::from("/var/lib/deploybot"),
            slack: SlackConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path` (or defaults), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override secrets from `lookup` (the process environment in production).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(SLACK_TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.slack.token = Some(token);
        }
        if let Some(token) = lookup(VERIFICATION_TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.slack.verification_token = Some(token);
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }
}
