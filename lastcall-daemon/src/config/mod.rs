//! Configuration module for the lastcall daemon
//!
//! This module provides:
//! - `LastcallConfig` - Root configuration structure
//! - `TimingConfig` - Poll intervals, budgets and fixed delays of the lifecycle
//! - Collaborator settings for the probe, notifier, instance and drain backends

mod duration;

pub use duration::{format_duration, parse_duration};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::errors::{DaemonError, Result};
use crate::poll::PollBudget;
use duration::{deserialize_duration, serialize_duration};

/// Config file names searched for when no path is given
pub const CONFIG_FILE_NAMES: [&str; 2] = ["lastcall.yaml", "lastcall.yml"];

pub const ENV_WEBHOOK_URL: &str = "LASTCALL_WEBHOOK_URL";
pub const ENV_INSTANCE_ID: &str = "LASTCALL_INSTANCE_ID";
pub const ENV_SERVER_ADDRESS: &str = "LASTCALL_SERVER_ADDRESS";
pub const ENV_MAX_START_WAIT_MINUTES: &str = "LASTCALL_MAX_START_WAIT_MINUTES";
pub const ENV_IDLE_TIMEOUT_MINUTES: &str = "LASTCALL_IDLE_TIMEOUT_MINUTES";

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LastcallConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub instance: InstanceConfig,
    #[serde(default)]
    pub drain: DrainConfig,
}

// ============================================================================
// Sections
// ============================================================================

/// Where the game server listens and how it is advertised
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Address shown to players in status messages. Defaults to `host:port`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_address: Option<String>,
    #[serde(default = "default_probe_timeout", deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub probe_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_address: None,
            probe_timeout: default_probe_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn display_address(&self) -> String {
        self.public_address
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.host, self.port))
    }
}

/// Poll intervals, budgets and fixed delays of the lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    #[serde(default = "default_startup_poll_interval", deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub startup_poll_interval: Duration,
    #[serde(default = "default_max_start_wait_minutes")]
    pub max_start_wait_minutes: u64,
    #[serde(default = "default_idle_poll_interval", deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub idle_poll_interval: Duration,
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: u64,
    #[serde(default = "default_grace_check_interval", deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub grace_check_interval: Duration,
    #[serde(default = "default_grace_check_count")]
    pub grace_check_count: u32,
    #[serde(default = "default_drain_poll_interval", deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub drain_poll_interval: Duration,
    #[serde(default = "default_drain_settle_delay", deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub drain_settle_delay: Duration,
    #[serde(default = "default_failed_start_delay", deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub failed_start_delay: Duration,
    #[serde(default = "default_postpone_delay", deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub postpone_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            startup_poll_interval: default_startup_poll_interval(),
            max_start_wait_minutes: default_max_start_wait_minutes(),
            idle_poll_interval: default_idle_poll_interval(),
            idle_timeout_minutes: default_idle_timeout_minutes(),
            grace_check_interval: default_grace_check_interval(),
            grace_check_count: default_grace_check_count(),
            drain_poll_interval: default_drain_poll_interval(),
            drain_settle_delay: default_drain_settle_delay(),
            failed_start_delay: default_failed_start_delay(),
            postpone_delay: default_postpone_delay(),
        }
    }
}

impl TimingConfig {
    /// Attempts allowed while waiting for the server to come up.
    /// With the default 15s interval this is `max_start_wait_minutes * 4`.
    pub fn startup_budget(&self) -> PollBudget {
        PollBudget::covering(
            minutes(self.max_start_wait_minutes),
            self.startup_poll_interval,
        )
    }

    /// Consecutive idle samples that end the online phase
    pub fn idle_threshold(&self) -> u32 {
        PollBudget::covering(minutes(self.idle_timeout_minutes), self.idle_poll_interval)
            .max_attempts()
    }

    pub fn grace_budget(&self) -> PollBudget {
        PollBudget::new(self.grace_check_count, self.grace_check_interval)
    }

    fn validate(&self) -> Result<()> {
        let intervals = [
            ("timing.startup_poll_interval", self.startup_poll_interval),
            ("timing.idle_poll_interval", self.idle_poll_interval),
            ("timing.grace_check_interval", self.grace_check_interval),
            ("timing.drain_poll_interval", self.drain_poll_interval),
        ];
        for (name, interval) in intervals {
            if interval.is_zero() {
                return Err(DaemonError::Config(format!("{} must be greater than zero", name)));
            }
        }

        if self.max_start_wait_minutes == 0 {
            return Err(DaemonError::Config(
                "timing.max_start_wait_minutes must be at least 1".to_string(),
            ));
        }
        if self.idle_timeout_minutes == 0 {
            return Err(DaemonError::Config(
                "timing.idle_timeout_minutes must be at least 1".to_string(),
            ));
        }
        if self.grace_check_count == 0 {
            return Err(DaemonError::Config(
                "timing.grace_check_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Status message delivery
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default = "default_request_timeout", deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub request_timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            username: default_username(),
            avatar_url: None,
            footer: None,
            request_timeout: default_request_timeout(),
        }
    }
}

/// Compute instance power actions
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_restart_command")]
    pub restart: Vec<String>,
    #[serde(default = "default_shutdown_command")]
    pub shutdown: Vec<String>,
    #[serde(default = "default_command_timeout", deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
    pub command_timeout: Duration,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            restart: default_restart_command(),
            shutdown: default_shutdown_command(),
            command_timeout: default_command_timeout(),
        }
    }
}

/// Game process sessions to stop before powering off
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DrainConfig {
    /// tmux invocation, e.g. `["tmux", "-L", "minecraft"]` for a dedicated socket
    #[serde(default = "default_tmux_command")]
    pub tmux: Vec<String>,
    #[serde(default = "default_session_name")]
    pub session_name: String,
    #[serde(default = "default_stop_command")]
    pub stop_command: String,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            tmux: default_tmux_command(),
            session_name: default_session_name(),
            stop_command: default_stop_command(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl LastcallConfig {
    /// Load the config file (or defaults when `path` is `None`), overlay the
    /// environment and validate the result.
    pub fn load(path: Option<&Path>, env: &HashMap<String, String>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                debug!("No config file, using defaults");
                Self::default()
            }
        };

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DaemonError::ConfigNotFound(path.to_path_buf())
            } else {
                DaemonError::Io(e)
            }
        })?;
        Self::parse(&contents, path)
    }

    /// Parse YAML contents; `path` is only used for error reporting
    pub fn parse(contents: &str, path: &Path) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let deserializer = serde_yaml::Deserializer::from_str(contents);
        serde_path_to_error::deserialize(deserializer).map_err(|source| {
            DaemonError::ConfigParse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Overlay recognised `LASTCALL_*` variables
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<()> {
        if let Some(url) = env.get(ENV_WEBHOOK_URL) {
            self.notify.webhook_url = url.trim().to_string();
        }
        if let Some(id) = env.get(ENV_INSTANCE_ID) {
            self.instance.id = id.trim().to_string();
        }
        if let Some(address) = env.get(ENV_SERVER_ADDRESS) {
            self.server.public_address = Some(address.trim().to_string());
        }
        if let Some(value) = env.get(ENV_MAX_START_WAIT_MINUTES) {
            self.timing.max_start_wait_minutes = parse_minutes(ENV_MAX_START_WAIT_MINUTES, value)?;
        }
        if let Some(value) = env.get(ENV_IDLE_TIMEOUT_MINUTES) {
            self.timing.idle_timeout_minutes = parse_minutes(ENV_IDLE_TIMEOUT_MINUTES, value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.timing.validate()?;

        let url = self.notify.webhook_url.as_str();
        if url.is_empty() {
            return Err(DaemonError::Config(format!(
                "notify.webhook_url is required (or set {})",
                ENV_WEBHOOK_URL
            )));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(DaemonError::Config(format!(
                "notify.webhook_url must be an http(s) URL, got '{}'",
                url
            )));
        }

        if self.instance.id.is_empty() {
            return Err(DaemonError::Config(format!(
                "instance.id is required (or set {})",
                ENV_INSTANCE_ID
            )));
        }
        if self.instance.restart.is_empty() || self.instance.shutdown.is_empty() {
            return Err(DaemonError::Config(
                "instance.restart and instance.shutdown must name a command".to_string(),
            ));
        }

        if self.drain.tmux.is_empty() {
            return Err(DaemonError::Config("drain.tmux must name a command".to_string()));
        }
        if self.drain.session_name.is_empty() {
            return Err(DaemonError::Config("drain.session_name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Find a config file in `start_dir` or any of its parents
    pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
        let mut current = start_dir.to_path_buf();
        loop {
            for name in CONFIG_FILE_NAMES {
                let candidate = current.join(name);
                if candidate.exists() {
                    return Some(candidate);
                }
            }

            if !current.pop() {
                return None;
            }
        }
    }
}

fn parse_minutes(key: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| DaemonError::InvalidEnv {
        key: key.to_string(),
        message: format!("expected a whole number of minutes, got '{}'", value),
    })
}

fn minutes(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(60))
}

// ============================================================================
// Defaults
// ============================================================================

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    25565
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_startup_poll_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_max_start_wait_minutes() -> u64 {
    10
}

fn default_idle_poll_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_idle_timeout_minutes() -> u64 {
    15
}

fn default_grace_check_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_grace_check_count() -> u32 {
    12
}

fn default_drain_poll_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_drain_settle_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_failed_start_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_postpone_delay() -> Duration {
    Duration::from_secs(15)
}

fn default_username() -> String {
    "lastcall".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_restart_command() -> Vec<String> {
    oci_instance_action("SOFTRESET")
}

fn default_shutdown_command() -> Vec<String> {
    oci_instance_action("SOFTSTOP")
}

fn oci_instance_action(action: &str) -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        format!(
            "oci compute instance action --action {} --instance-id \"${}\"",
            action, ENV_INSTANCE_ID
        ),
    ]
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_tmux_command() -> Vec<String> {
    vec!["tmux".to_string()]
}

fn default_session_name() -> String {
    "MC_SERVER_RUNNING".to_string()
}

fn default_stop_command() -> String {
    "stop".to_string()
}
