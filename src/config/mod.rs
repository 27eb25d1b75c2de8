//! Configuration Module
//!
//! Handles configuration loading, validation, and saving.

use crate::command::{CommandSettings, DefaultSubCommands};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub commands: CommandsConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    pinbot_home().join("pinbot.db")
}

/// Base directory for config and data: `~/.config/pinbot/`
pub fn pinbot_home() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pinbot")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write logs to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`), used for the Web API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// App-level token (`xapp-...`), used for Socket Mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_token: Option<String>,

    /// The bot's own user ID; looked up with `auth.test` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_user_id: Option<String>,

    /// Prefix for archived message permalinks,
    /// e.g. `https://myteam.slack.com/archives`
    #[serde(default)]
    pub permalink_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Lower-case command and sub-command before matching
    #[serde(default = "default_true")]
    pub case_fold: bool,

    /// Leaderboard searches ignore case
    #[serde(default = "default_true")]
    pub case_insensitive_search: bool,

    /// Sub-command implied when a command is given without one
    #[serde(default = "default_sub_commands")]
    pub defaults: HashMap<String, String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            case_fold: true,
            case_insensitive_search: true,
            defaults: default_sub_commands(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sub_commands() -> HashMap<String, String> {
    HashMap::from([("fg".to_string(), "round".to_string())])
}

impl CommandsConfig {
    pub fn settings(&self) -> CommandSettings {
        CommandSettings {
            case_fold: self.case_fold,
            case_insensitive_search: self.case_insensitive_search,
        }
    }

    pub fn default_sub_commands(&self) -> DefaultSubCommands {
        DefaultSubCommands::new(self.defaults.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Pull the previous day's history once a day
    #[serde(default = "default_true")]
    pub refresh_enabled: bool,

    /// Local hour (0-23) the refresh runs at
    #[serde(default)]
    pub refresh_hour: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            refresh_enabled: true,
            refresh_hour: 0,
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. Default values
    /// 2. System config: ~/.config/pinbot/config.toml
    /// 3. Local config: ./pinbot.toml
    /// 4. Environment variables
    pub fn load() -> Result<Self> {
        tracing::debug!("Loading configuration...");

        let mut config = Self::default();

        let system_config_path = Self::system_config_path();
        if system_config_path.exists() {
            tracing::debug!("Loading system config from: {:?}", system_config_path);
            config = Self::from_file(&system_config_path)?;
        }

        let local_config_path = Self::local_config_path();
        if local_config_path.exists() {
            tracing::debug!("Loading local config from: {:?}", local_config_path);
            config = Self::from_file(&local_config_path)?;
        }

        config.apply_env_overrides(|key| std::env::var(key).ok());

        tracing::debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration from a specific file, then apply env overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading configuration from custom path: {:?}", path);

        if !path.exists() {
            anyhow::bail!("Config file not found: {:?}", path);
        }
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());

        tracing::debug!("Configuration loaded successfully from custom path");
        Ok(config)
    }

    pub fn system_config_path() -> PathBuf {
        pinbot_home().join("config.toml")
    }

    fn local_config_path() -> PathBuf {
        PathBuf::from("./pinbot.toml")
    }

    /// Parse a TOML file. A later file replaces an earlier one wholesale.
    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&contents).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Override settings from the environment, read through `var`.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(db_path) = var("PINBOT_DB_PATH") {
            self.database.path = PathBuf::from(db_path);
        }
        if let Some(level) = var("PINBOT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(token) = var("SLACK_BOT_TOKEN") {
            self.slack.bot_token = Some(token);
        }
        if let Some(token) = var("SLACK_APP_TOKEN") {
            self.slack.app_token = Some(token);
        }
        if let Some(base_url) = var("PINBOT_PERMALINK_BASE_URL") {
            self.slack.permalink_base_url = base_url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        tracing::debug!("Validating configuration...");

        if let Some(parent) = self.database.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tracing::warn!(
                "Database parent directory does not exist, will be created: {:?}",
                parent
            );
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        let base_url = &self.slack.permalink_base_url;
        if !base_url.is_empty() && !base_url.starts_with("https://") {
            anyhow::bail!("permalink_base_url must start with https://, got {}", base_url);
        }

        if self.archive.refresh_hour > 23 {
            anyhow::bail!(
                "Invalid archive refresh_hour: {}. Must be 0-23",
                self.archive.refresh_hour
            );
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Bot and app tokens, or an error naming what is missing.
    pub fn slack_tokens(&self) -> Result<(String, String)> {
        let bot = self
            .slack
            .bot_token
            .clone()
            .filter(|t| !t.is_empty())
            .context("Slack bot token missing: set slack.bot_token or SLACK_BOT_TOKEN")?;
        let app = self
            .slack
            .app_token
            .clone()
            .filter(|t| !t.is_empty())
            .context("Slack app token missing: set slack.app_token or SLACK_APP_TOKEN")?;
        Ok((bot, app))
    }

    /// Copy with tokens masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |token: &Option<String>| token.as_ref().map(|_| "********".to_string());
        let mut config = self.clone();
        config.slack.bot_token = mask(&self.slack.bot_token);
        config.slack.app_token = mask(&self.slack.app_token);
        config
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        tracing::info!("Configuration saved to: {:?}", path);
        Ok(())
    }
}
