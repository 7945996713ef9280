//! Configuration for the dashboard, read from `.devagent/devagent.toml`.
//!
//! Values are layered: file, then environment, then CLI flags. Every field
//! has a default, so a missing file or a partial one is fine.
//!
//! # Configuration File Format
//!
//! ```toml
//! api_url = "http://localhost:8000"
//! request_timeout_secs = 30
//! poll_interval_ms = 5000
//! reconcile_delay_ms = 1000
//! optimistic_placeholders = false
//! placeholder_ttl_ms = 30000
//! agent_reply_delay_ms = 2000
//! recent_jobs_limit = 5
//! log_dir = ".devagent/logs"
//! serve_port = 3142
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dashboard::session::SessionTimings;
use crate::errors::ConfigError;

/// Environment variable overriding `api_url`.
pub const ENV_API_URL: &str = "DEVAGENT_API_URL";
/// Environment variable overriding `poll_interval_ms`.
pub const ENV_POLL_INTERVAL_MS: &str = "DEVAGENT_POLL_INTERVAL_MS";

pub const CONFIG_DIR: &str = ".devagent";
pub const CONFIG_FILE: &str = "devagent.toml";

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_reconcile_delay_ms() -> u64 {
    1000
}

fn default_placeholder_ttl_ms() -> u64 {
    30_000
}

fn default_agent_reply_delay_ms() -> u64 {
    2000
}

fn default_recent_jobs_limit() -> usize {
    5
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("logs")
}

fn default_serve_port() -> u16 {
    3142
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Base URL of the agent backend.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Delay before the single reload that follows a demo trigger.
    #[serde(default = "default_reconcile_delay_ms")]
    pub reconcile_delay_ms: u64,
    /// Show a pending placeholder job right after a trigger is accepted.
    #[serde(default)]
    pub optimistic_placeholders: bool,
    #[serde(default = "default_placeholder_ttl_ms")]
    pub placeholder_ttl_ms: u64,
    #[serde(default = "default_agent_reply_delay_ms")]
    pub agent_reply_delay_ms: u64,
    #[serde(default = "default_recent_jobs_limit")]
    pub recent_jobs_limit: usize,
    /// Relative paths resolve against the project directory.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_serve_port")]
    pub serve_port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            reconcile_delay_ms: default_reconcile_delay_ms(),
            optimistic_placeholders: false,
            placeholder_ttl_ms: default_placeholder_ttl_ms(),
            agent_reply_delay_ms: default_agent_reply_delay_ms(),
            recent_jobs_limit: default_recent_jobs_limit(),
            log_dir: default_log_dir(),
            serve_port: default_serve_port(),
        }
    }
}

/// Values given on the command line; `None` keeps the lower layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_url: Option<String>,
    pub serve_port: Option<u16>,
}

/// Path of the config file inside `project_dir`.
pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
}

impl DashboardConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(CONFIG_FILE),
            source,
        })
    }

    /// Load from `.devagent/devagent.toml`, or defaults if it does not exist.
    pub fn load_or_default(project_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_path(project_dir);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File, then environment, then CLI.
    pub fn resolve(project_dir: &Path, cli: &CliOverrides) -> Result<Self, ConfigError> {
        let mut config = Self::load_or_default(project_dir)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.apply_cli(cli);
        if config.log_dir.is_relative() {
            config.log_dir = project_dir.join(&config.log_dir);
        }
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`. Unparseable values
    /// are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            match raw.trim().parse() {
                Ok(ms) => self.poll_interval_ms = ms,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid {}", ENV_POLL_INTERVAL_MS),
            }
        }
    }

    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(url) = &cli.api_url {
            self.api_url = url.clone();
        }
        if let Some(port) = cli.serve_port {
            self.serve_port = port;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Timing knobs for a session. A zero poll interval falls back to the
    /// default.
    pub fn timings(&self) -> SessionTimings {
        let defaults = SessionTimings::default();
        SessionTimings {
            poll_interval: match self.poll_interval_ms {
                0 => defaults.poll_interval,
                ms => Duration::from_millis(ms),
            },
            reconcile_delay: Duration::from_millis(self.reconcile_delay_ms),
            agent_reply_delay: Duration::from_millis(self.agent_reply_delay_ms),
            placeholder_ttl: self
                .optimistic_placeholders
                .then(|| Duration::from_millis(self.placeholder_ttl_ms)),
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            warnings.push(format!(
                "Invalid api_url '{}': should start with http:// or https://",
                self.api_url
            ));
        }
        if self.poll_interval_ms == 0 {
            warnings.push("poll_interval_ms must be positive; the default will be used".to_string());
        }
        if self.request_timeout_secs == 0 {
            warnings.push("request_timeout_secs of 0 makes every request time out".to_string());
        }
        if self.optimistic_placeholders && self.placeholder_ttl_ms <= self.reconcile_delay_ms {
            warnings.push(format!(
                "placeholder_ttl_ms ({}) should exceed reconcile_delay_ms ({}) or placeholders expire before the reload",
                self.placeholder_ttl_ms, self.reconcile_delay_ms
            ));
        }
        if self.recent_jobs_limit == 0 {
            warnings.push("recent_jobs_limit of 0 hides every recent job".to_string());
        }

        warnings
    }
}
