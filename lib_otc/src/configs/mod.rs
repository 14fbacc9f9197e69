//! # Client Settings
//!
//! Layered configuration for programs built on the client. Sources, lowest
//! priority first:
//!
//! 1. Built-in defaults ([`Settings::defaults`]).
//! 2. A JSON file (`camelCase` keys), `otc_client.conf` or `--config-path`.
//! 3. Environment variables (`OTC_*`) and command line flags.
//!
//! Every field is optional so that the layers merge with a plain `Option::or`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::codec::Encoding;
use crate::connection::client::{ClientConfig, DEFAULT_WS_URL};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "otc_client.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "OTC websocket client", version)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[clap(long, env = "OTC_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "OTC_WS_URL", help = "Websocket URL of the OTC API.")]
    pub ws_url: Option<String>,

    #[clap(long, env = "OTC_API_TOKEN", hide_env_values = true, help = "API token used to authenticate.")]
    pub api_token: Option<String>,

    #[clap(long, env = "OTC_JSON", num_args = 0..=1, default_missing_value = "true", help = "Use the JSON encoding instead of binary.")]
    pub json: Option<bool>,

    #[clap(long, env = "OTC_RECONNECT", num_args = 0..=1, default_missing_value = "true", help = "Reconnect after the connection drops.")]
    pub reconnect: Option<bool>,

    #[clap(long, env = "OTC_RECONNECT_BASE_DELAY_MS", help = "Base delay in milliseconds for reconnect attempts.")]
    pub reconnect_base_delay_ms: Option<u64>,

    #[clap(long, env = "OTC_RECONNECT_MAX_DELAY_MS", help = "Maximum delay in milliseconds for reconnect attempts.")]
    pub reconnect_max_delay_ms: Option<u64>,

    #[clap(long, env = "OTC_MAX_RECONNECT_ATTEMPTS", help = "Consecutive failed attempts before giving up (unlimited if unset).")]
    pub max_reconnect_attempts: Option<u32>,

    #[clap(long, env = "OTC_AUTH_TIMEOUT_MS", help = "Milliseconds to wait for the authentication response.")]
    pub auth_timeout_ms: Option<u64>,

    #[clap(long, env = "OTC_REQUEST_TIMEOUT_MS", help = "Milliseconds to wait for a request's response.")]
    pub request_timeout_ms: Option<u64>,

    #[clap(long, env = "OTC_QUEUE_CAPACITY", help = "Capacity of the outbound message queue.")]
    pub queue_capacity: Option<usize>,

    #[clap(long, env = "OTC_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "OTC_LOG_DIR", help = "Directory for rotating log files.")]
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    /// Built-in defaults, matching [`ClientConfig::default`].
    pub fn defaults() -> Self {
        let client = ClientConfig::default();
        Self {
            ws_url: Some(DEFAULT_WS_URL.to_string()),
            json: Some(false),
            reconnect: Some(client.reconnect),
            reconnect_base_delay_ms: Some(millis(client.reconnect_base_delay)),
            reconnect_max_delay_ms: Some(millis(client.reconnect_max_delay)),
            auth_timeout_ms: Some(millis(client.auth_timeout)),
            request_timeout_ms: Some(millis(client.request_timeout)),
            queue_capacity: Some(client.outbound_queue_capacity),
            log_level: Some("info".to_string()),
            ..Default::default()
        }
    }

    /// Merges two settings, where `other` overrides `self` for `Some` values.
    pub fn merge(self, other: Settings) -> Settings {
        Settings {
            config_path: other.config_path.or(self.config_path),
            ws_url: other.ws_url.or(self.ws_url),
            api_token: other.api_token.or(self.api_token),
            json: other.json.or(self.json),
            reconnect: other.reconnect.or(self.reconnect),
            reconnect_base_delay_ms: other.reconnect_base_delay_ms.or(self.reconnect_base_delay_ms),
            reconnect_max_delay_ms: other.reconnect_max_delay_ms.or(self.reconnect_max_delay_ms),
            max_reconnect_attempts: other.max_reconnect_attempts.or(self.max_reconnect_attempts),
            auth_timeout_ms: other.auth_timeout_ms.or(self.auth_timeout_ms),
            request_timeout_ms: other.request_timeout_ms.or(self.request_timeout_ms),
            queue_capacity: other.queue_capacity.or(self.queue_capacity),
            log_level: other.log_level.or(self.log_level),
            log_dir: other.log_dir.or(self.log_dir),
        }
    }

    /// Reads a JSON settings file.
    pub fn from_file(path: &Path) -> Result<Settings> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// # Load
    ///
    /// Builds settings from defaults, the config file and the process's
    /// environment and command line.
    pub fn load() -> Result<Settings> {
        Self::layer(Settings::parse())
    }

    /// Like [`Self::load`] with explicit arguments (first item is the program name).
    pub fn load_from<I, T>(args: I) -> Result<Settings>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Settings::try_parse_from(args).context("Invalid command line")?;
        Self::layer(cli)
    }

    /// Layers `cli` (flags and environment) over the file and the defaults.
    pub fn layer(cli: Settings) -> Result<Settings> {
        let mut settings = Settings::defaults();

        let explicit = cli.config_path.is_some();
        let path = cli
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if path.exists() {
            settings = settings.merge(Self::from_file(&path)?);
        } else if explicit {
            anyhow::bail!("Config file not found at {}", path.display());
        } else {
            tracing::debug!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display());
        }

        Ok(settings.merge(cli))
    }

    /// # Into Client Config
    ///
    /// Resolves the settings into a validated [`ClientConfig`]. Unset fields
    /// keep the [`ClientConfig`] defaults.
    pub fn into_client_config(self) -> Result<ClientConfig> {
        let defaults = ClientConfig::default();
        let ws_url = self.ws_url.unwrap_or(defaults.ws_url);
        let encoding = if self.json.unwrap_or(false) {
            Encoding::Json
        } else {
            Encoding::from_url(&ws_url)
        };

        let config = ClientConfig {
            ws_url,
            api_token: self.api_token.filter(|token| !token.trim().is_empty()),
            encoding,
            reconnect: self.reconnect.unwrap_or(defaults.reconnect),
            reconnect_base_delay: self
                .reconnect_base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_base_delay),
            reconnect_max_delay: self
                .reconnect_max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_max_delay),
            max_reconnect_attempts: self.max_reconnect_attempts,
            auth_timeout: self
                .auth_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.auth_timeout),
            request_timeout: self
                .request_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            outbound_queue_capacity: self.queue_capacity.unwrap_or(defaults.outbound_queue_capacity),
        };
        config.validate()?;
        Ok(config)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
