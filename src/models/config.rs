//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::MailAddress;

/// Root settings loaded from the optional TOML settings file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and checking behavior settings
    #[serde(default)]
    pub checker: CheckerConfig,

    /// Mail transport settings
    #[serde(default)]
    pub mail: MailConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.checker.user_agent.trim().is_empty() {
            return Err(AppError::validation("checker.user_agent is empty"));
        }
        if self.checker.timeout_secs == 0 {
            return Err(AppError::validation("checker.timeout_secs must be > 0"));
        }
        if self.checker.max_concurrent == 0 {
            return Err(AppError::validation("checker.max_concurrent must be > 0"));
        }
        if self.mail.host.trim().is_empty() {
            return Err(AppError::validation("mail.host is empty"));
        }
        Ok(())
    }
}

/// HTTP client and checking behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Number of resources checked at the same time
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Lines of context around each diff hunk
    #[serde(default = "defaults::diff_context")]
    pub diff_context: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            diff_context: defaults::diff_context(),
        }
    }
}

/// SMTP relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "defaults::mail_host")]
    pub host: String,

    #[serde(default = "defaults::mail_port")]
    pub port: u16,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: defaults::mail_host(),
            port: defaults::mail_port(),
        }
    }
}

/// Per-invocation options taken from the command line.
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory holding the `.md5` and `.site` artifacts
    pub dir: PathBuf,

    /// Resource list file
    pub conf_file: PathBuf,

    /// Tag used in mail subjects
    pub tag: String,

    /// Sender address
    pub from: MailAddress,

    /// Detect changes without saving state or sending mail
    pub simulate: bool,

    /// Remove all artifacts before the pass
    pub clean: bool,

    /// Whether notifications are delivered at all
    pub send_mails: bool,
}

impl Options {
    /// Build options with defaults for everything but the sender.
    pub fn new(from: &str) -> Result<Self> {
        if from.trim().is_empty() {
            return Err(AppError::config("No sender mail address given"));
        }
        Ok(Self {
            dir: PathBuf::from(defaults::DIR),
            conf_file: PathBuf::from(defaults::CONF_FILE),
            tag: defaults::TAG.to_string(),
            from: MailAddress::parse(from),
            simulate: false,
            clean: false,
            send_mails: true,
        })
    }

    /// Whether state commits are allowed in this invocation.
    pub fn persist(&self) -> bool {
        !self.simulate
    }

    /// Whether notifications go out in this invocation.
    pub fn notify(&self) -> bool {
        self.send_mails && !self.simulate
    }
}

pub mod defaults {
    pub const DIR: &str = "/var/tmp/wcc";
    pub const CONF_FILE: &str = "conf";
    pub const TAG: &str = "web change checker2";

    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; wcc/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        1
    }
    pub fn diff_context() -> usize {
        1
    }
    pub fn mail_host() -> String {
        "localhost".into()
    }
    pub fn mail_port() -> u16 {
        25
    }
}
