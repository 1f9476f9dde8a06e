use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Shared workspace collection every session reads and writes
pub const DEFAULT_COLLECTION_PATH: &str = "artifacts/content-calendar/public/data/content_posts";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_collection_path")]
    pub collection_path: String,
    /// Pre-issued sign-in token; anonymous session when absent
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_week_start")]
    pub week_start: String,
    #[serde(default = "default_view")]
    pub default_view: String,
    #[serde(default = "default_status_message_secs")]
    pub status_message_secs: u64,
    #[serde(default)]
    pub key_bindings: KeyBindings,
    #[serde(default = "default_current_theme")]
    pub current_theme: String,
    #[serde(default)]
    pub themes: HashMap<String, Theme>,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBindings {
    #[serde(default = "default_quit")]
    pub quit: String,
    #[serde(default = "default_new")]
    pub new: String,
    #[serde(default = "default_new_any")]
    pub new_any: String,
    #[serde(default = "default_plan_blog")]
    pub plan_blog: String,
    #[serde(default = "default_edit")]
    pub edit: String,
    #[serde(default = "default_save")]
    pub save: String,
    #[serde(default = "default_delete")]
    pub delete: String,
    #[serde(default = "default_attach_image")]
    pub attach_image: String,
    #[serde(default = "default_remove_image")]
    pub remove_image: String,
    #[serde(default = "default_toggle_view")]
    pub toggle_view: String,
    #[serde(default = "default_prev_month")]
    pub prev_month: String,
    #[serde(default = "default_next_month")]
    pub next_month: String,
    #[serde(default = "default_today")]
    pub today: String,
    #[serde(default = "default_help")]
    pub help: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default = "default_fg")]
    pub fg: String,
    #[serde(default = "default_bg")]
    pub bg: String,
    #[serde(default = "default_highlight_bg")]
    pub highlight_bg: String,
    /// Empty means "pick a contrasting color for highlight_bg"
    #[serde(default)]
    pub highlight_fg: String,
    #[serde(default = "default_today_fg")]
    pub today_fg: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            collection_path: default_collection_path(),
            auth_token: None,
            week_start: default_week_start(),
            default_view: default_view(),
            status_message_secs: default_status_message_secs(),
            key_bindings: KeyBindings::default(),
            current_theme: default_current_theme(),
            themes: HashMap::new(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            quit: default_quit(),
            new: default_new(),
            new_any: default_new_any(),
            plan_blog: default_plan_blog(),
            edit: default_edit(),
            save: default_save(),
            delete: default_delete(),
            attach_image: default_attach_image(),
            remove_image: default_remove_image(),
            toggle_view: default_toggle_view(),
            prev_month: default_prev_month(),
            next_month: default_next_month(),
            today: default_today(),
            help: default_help(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: default_fg(),
            bg: default_bg(),
            highlight_bg: default_highlight_bg(),
            highlight_fg: String::new(),
            today_fg: default_today_fg(),
        }
    }
}

impl Theme {
    /// Preset themes that are always available
    pub fn get_preset_themes() -> HashMap<String, Theme> {
        let mut themes = HashMap::new();

        themes.insert("default".to_string(), Theme::default());

        themes.insert("light".to_string(), Theme {
            fg: "black".to_string(),
            bg: "white".to_string(),
            highlight_bg: "blue".to_string(),
            highlight_fg: "white".to_string(),
            today_fg: "magenta".to_string(),
        });

        themes.insert("indigo".to_string(), Theme {
            fg: "white".to_string(),
            bg: "#1e1b4b".to_string(),
            highlight_bg: "#4f46e5".to_string(),
            highlight_fg: "white".to_string(),
            today_fg: "#c4b5fd".to_string(),
        });

        themes
    }
}

fn default_database_path() -> String {
    // Fallback only; the profile's data dir is applied at load time
    if let Some(data_dir) = utils::get_data_dir(utils::Profile::Prod) {
        data_dir.join("calendar.db").to_string_lossy().to_string()
    } else {
        "~/.local/share/content-calendar/calendar.db".to_string()
    }
}

fn default_collection_path() -> String {
    DEFAULT_COLLECTION_PATH.to_string()
}

fn default_week_start() -> String {
    "Sunday".to_string()
}

fn default_view() -> String {
    "Calendar".to_string()
}

fn default_status_message_secs() -> u64 {
    3
}

fn default_quit() -> String {
    "q".to_string()
}

fn default_new() -> String {
    "n".to_string()
}

fn default_new_any() -> String {
    "N".to_string()
}

fn default_plan_blog() -> String {
    "b".to_string()
}

fn default_edit() -> String {
    "Enter".to_string()
}

fn default_save() -> String {
    "Ctrl+s".to_string()
}

fn default_delete() -> String {
    "Ctrl+d".to_string()
}

fn default_attach_image() -> String {
    "Ctrl+o".to_string()
}

fn default_remove_image() -> String {
    "Ctrl+x".to_string()
}

fn default_toggle_view() -> String {
    "v".to_string()
}

fn default_prev_month() -> String {
    "[".to_string()
}

fn default_next_month() -> String {
    "]".to_string()
}

fn default_today() -> String {
    "t".to_string()
}

fn default_help() -> String {
    "F1".to_string()
}

fn default_current_theme() -> String {
    "default".to_string()
}

fn default_fg() -> String {
    "white".to_string()
}

fn default_bg() -> String {
    "black".to_string()
}

fn default_highlight_bg() -> String {
    "blue".to_string()
}

fn default_today_fg() -> String {
    "lightmagenta".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Invalid setting {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

impl Config {
    /// Load configuration from the profile's config file, creating it with
    /// defaults if missing
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        Self::load_from_path(&config_path, profile)
    }

    /// Load configuration from an explicit file path
    pub fn load_from_path(config_path: &Path, profile: utils::Profile) -> Result<Self, ConfigError> {
        let config = if config_path.exists() {
            let contents = fs::read_to_string(config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let mut config: Config = toml::from_str(&contents)?;
            if config.config_version.is_none() {
                config.config_version = Some(CURRENT_CONFIG_VERSION);
            }
            config
        } else {
            let mut config = Config::default();
            config.database_path = Self::default_database_path_for_profile(profile);
            config.save_to_path(config_path)?;
            tracing::info!(path = %config_path.display(), "created default config");
            config
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_week_start(&self.week_start)?;
        crate::database::CollectionPath::parse(&self.collection_path).map_err(|_| {
            ConfigError::InvalidValue {
                key: "collection_path",
                value: self.collection_path.clone(),
            }
        })?;
        if !matches!(self.default_view.as_str(), "Calendar" | "List") {
            return Err(ConfigError::InvalidValue {
                key: "default_view",
                value: self.default_view.clone(),
            });
        }
        Ok(())
    }

    fn save_to_path(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        match utils::get_data_dir(profile) {
            Some(data_dir) => data_dir.join("calendar.db").to_string_lossy().to_string(),
            None => match profile {
                utils::Profile::Dev => "~/.local/share/content-calendar-dev/calendar.db".to_string(),
                utils::Profile::Prod => "~/.local/share/content-calendar/calendar.db".to_string(),
            },
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    pub fn week_start(&self) -> Weekday {
        parse_week_start(&self.week_start).unwrap_or(Weekday::Sun)
    }

    /// Get the currently active theme, falling back to the default preset
    pub fn get_active_theme(&self) -> Theme {
        self.themes
            .get(&self.current_theme)
            .cloned()
            .or_else(|| Theme::get_preset_themes().remove(&self.current_theme))
            .unwrap_or_default()
    }
}

fn parse_week_start(value: &str) -> Result<Weekday, ConfigError> {
    match value {
        "Sunday" => Ok(Weekday::Sun),
        "Monday" => Ok(Weekday::Mon),
        other => Err(ConfigError::InvalidValue {
            key: "week_start",
            value: other.to_string(),
        }),
    }
}
