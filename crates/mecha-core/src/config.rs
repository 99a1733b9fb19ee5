//! MechaHelper configuration system.
//!
//! Values come from an optional TOML file and are then overridden by
//! `MECHA_*` environment variables, so a deployment can run from env alone.

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MechaError, Result};
use crate::types::RecipientId;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MechaConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Telegram user ids allowed to run admin commands.
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    /// Collective destination that receives every daily broadcast.
    #[serde(default)]
    pub group_chat_id: Option<RecipientId>,
    /// IANA zone name for the daily broadcast.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Daily broadcast time, `HH:MM`.
    #[serde(default = "default_notify_time")]
    pub notify_time: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub telegram: TelegramSettings,
}

fn default_timezone() -> String { "Asia/Yekaterinburg".into() }
fn default_notify_time() -> String { "20:00".into() }

impl Default for MechaConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_ids: Vec::new(),
            group_chat_id: None,
            timezone: default_timezone(),
            notify_time: default_notify_time(),
            storage: StorageConfig::default(),
            telegram: TelegramSettings::default(),
        }
    }
}

impl MechaConfig {
    /// Load config from the default path (~/.mechahelper/config.toml), then apply env overrides.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific path (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MechaError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| MechaError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Override fields from `MECHA_*` process environment variables.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Override fields from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("MECHA_BOT_TOKEN") {
            self.bot_token = token;
        }
        if let Some(ids) = lookup("MECHA_ADMIN_IDS") {
            self.admin_ids = ids
                .split(',')
                .filter_map(|s| {
                    let s = s.trim();
                    match s.parse::<i64>() {
                        Ok(id) => Some(id),
                        Err(_) => {
                            if !s.is_empty() {
                                tracing::warn!("⚠️ Ignoring invalid admin id '{s}'");
                            }
                            None
                        }
                    }
                })
                .collect();
        }
        if let Some(group) = lookup("MECHA_GROUP_CHAT_ID") {
            self.group_chat_id = if group.trim().is_empty() {
                None
            } else {
                group.parse().ok()
            };
        }
        if let Some(tz) = lookup("MECHA_TIMEZONE") {
            self.timezone = tz;
        }
        if let Some(time) = lookup("MECHA_NOTIFY_TIME") {
            self.notify_time = time;
        }
        if let Some(path) = lookup("MECHA_HOMEWORK_FILE") {
            self.storage.homework_file = path;
        }
        if let Some(path) = lookup("MECHA_SUBSCRIBERS_FILE") {
            self.storage.subscribers_file = path;
        }
        if let Some(path) = lookup("MECHA_MEDIA_DIR") {
            self.storage.media_dir = path;
        }
    }

    /// Check everything needed to start the bot.
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(MechaError::Config(
                "bot token is empty (set MECHA_BOT_TOKEN)".into(),
            ));
        }
        self.tz()?;
        self.fire_time()?;
        Ok(())
    }

    /// Parsed broadcast time zone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| MechaError::Config(format!("Unknown timezone '{}': {e}", self.timezone)))
    }

    /// Parsed daily broadcast time.
    pub fn fire_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.notify_time.trim(), "%H:%M").map_err(|e| {
            MechaError::Config(format!("Invalid notify_time '{}': {e}", self.notify_time))
        })
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the MechaHelper home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mechahelper")
    }
}

/// Where persisted state lives. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_homework_file")]
    pub homework_file: String,
    #[serde(default = "default_subscribers_file")]
    pub subscribers_file: String,
    #[serde(default = "default_media_dir")]
    pub media_dir: String,
}

fn default_homework_file() -> String { "homework.json".into() }
fn default_subscribers_file() -> String { "subscribers.json".into() }
fn default_media_dir() -> String { "media".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            homework_file: default_homework_file(),
            subscribers_file: default_subscribers_file(),
            media_dir: default_media_dir(),
        }
    }
}

impl StorageConfig {
    pub fn homework_path(&self) -> PathBuf {
        expand_path(&self.homework_file)
    }

    pub fn subscribers_path(&self) -> PathBuf {
        expand_path(&self.subscribers_file)
    }

    pub fn media_path(&self) -> PathBuf {
        expand_path(&self.media_dir)
    }
}

/// Telegram client tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Seconds between polling rounds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Long-poll timeout passed to getUpdates.
    #[serde(default = "default_long_poll_secs")]
    pub long_poll_secs: u64,
    /// Per-request HTTP timeout for sends and downloads.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_poll_interval() -> u64 { 1 }
fn default_long_poll_secs() -> u64 { 30 }
fn default_request_timeout() -> u64 { 60 }

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            long_poll_secs: default_long_poll_secs(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = MechaConfig::default();
        assert_eq!(config.timezone, "Asia/Yekaterinburg");
        assert_eq!(config.fire_time().unwrap(), NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        assert_eq!(config.storage.homework_file, "homework.json");
        assert_eq!(config.storage.subscribers_file, "subscribers.json");
        assert_eq!(config.storage.media_dir, "media");
        assert!(config.group_chat_id.is_none());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            bot_token = "123:abc"
            admin_ids = [1862652984]
            group_chat_id = -1001234567890
            notify_time = "19:30"

            [storage]
            media_dir = "/var/lib/mecha/media"
        "#;

        let config: MechaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.admin_ids, vec![1862652984]);
        assert_eq!(config.group_chat_id, Some(RecipientId::Id(-1001234567890)));
        assert_eq!(config.fire_time().unwrap(), NaiveTime::from_hms_opt(19, 30, 0).unwrap());
        assert_eq!(config.storage.media_dir, "/var/lib/mecha/media");
        assert_eq!(config.storage.homework_file, "homework.json");
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: MechaConfig = toml::from_str("").unwrap();
        assert_eq!(config.notify_time, "20:00");
        assert_eq!(config.telegram.long_poll_secs, 30);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MECHA_BOT_TOKEN", "999:xyz"),
            ("MECHA_ADMIN_IDS", "1, 2,oops,3"),
            ("MECHA_GROUP_CHAT_ID", "@class_11b"),
            ("MECHA_TIMEZONE", "Europe/Moscow"),
            ("MECHA_MEDIA_DIR", "files"),
        ]
        .into_iter()
        .collect();

        let mut config = MechaConfig::default();
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.bot_token, "999:xyz");
        assert_eq!(config.admin_ids, vec![1, 2, 3]);
        assert_eq!(config.group_chat_id, Some(RecipientId::Name("@class_11b".into())));
        assert_eq!(config.tz().unwrap(), chrono_tz::Europe::Moscow);
        assert_eq!(config.storage.media_dir, "files");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = MechaConfig::default();
        assert!(config.validate().is_err(), "empty token");

        config.bot_token = "1:a".into();
        config.timezone = "Mars/Olympus".into();
        assert!(config.validate().is_err());

        config.timezone = default_timezone();
        config.notify_time = "8pm".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_home_dir() {
        let home = MechaConfig::home_dir();
        assert!(home.to_string_lossy().contains("mechahelper"));
    }
}
