use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("settings validation failed: {0}")]
    Settings(String),
    #[error("failed to resolve home directory for settings path")]
    HomeDirectoryUnavailable,
}

pub const GLOBAL_STATE_DIR: &str = ".dropwire";
pub const GLOBAL_SETTINGS_FILE_NAME: &str = "config.yaml";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_READ_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_READ_RETRY_DELAY_MS: u64 = 50;

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_read_retry_attempts() -> u32 {
    DEFAULT_READ_RETRY_ATTEMPTS
}

fn default_read_retry_delay_ms() -> u64 {
    DEFAULT_READ_RETRY_DELAY_MS
}

/// Fire-and-forget launch command for the external agent process. The
/// broker starts it on demand before the first request file is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LauncherSettings {
    pub command: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransportSettings {
    /// Drop directory shared with the external process. Its absence is a
    /// fatal-to-start configuration error, not a fatal-to-process one.
    pub directory: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_read_retry_attempts")]
    pub read_retry_attempts: u32,
    #[serde(default = "default_read_retry_delay_ms")]
    pub read_retry_delay_ms: u64,
    /// Optional per-request wait budget. Absent means a request with no
    /// response waits forever, matching the legacy behavior.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launcher: Option<LauncherSettings>,
}

impl TransportSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_retry_delay(&self) -> Duration {
        Duration::from_millis(self.read_retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PromptSettings {
    /// Immutable rules text, loaded once per prompt store lifetime.
    pub rules_path: PathBuf,
    /// Mutable prompt file, rewritten whole by the SetPrompt command.
    pub prompt_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    /// Root every command path is anchored under.
    pub project_root: PathBuf,
    pub transport: TransportSettings,
    pub prompts: PromptSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.transport.directory.is_dir() {
            return Err(ConfigError::Settings(format!(
                "transport directory `{}` does not exist",
                self.transport.directory.display()
            )));
        }
        if self.transport.poll_interval_ms == 0 {
            return Err(ConfigError::Settings(
                "transport.poll_interval_ms must be >= 1".to_string(),
            ));
        }
        if self.transport.read_retry_attempts == 0 {
            return Err(ConfigError::Settings(
                "transport.read_retry_attempts must be >= 1".to_string(),
            ));
        }
        if let Some(launcher) = &self.transport.launcher {
            if launcher.command.as_os_str().is_empty() {
                return Err(ConfigError::Settings(
                    "transport.launcher.command must be non-empty".to_string(),
                ));
            }
        }
        if self.project_root.as_os_str().is_empty() {
            return Err(ConfigError::Settings(
                "project_root must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn default_settings_path() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home)
        .join(GLOBAL_STATE_DIR)
        .join(GLOBAL_SETTINGS_FILE_NAME))
}
