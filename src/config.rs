//! Plugin configuration.
//!
//! Settings live in a TOML file with one table per feature. A missing file is
//! bootstrapped with the defaults below before loading, and every table is
//! `#[serde(default)]` so a partially edited file still loads.
//!
//! ```toml
//! [Quest]
//! enabled = true
//! trackedKey = "YW_Quest_MDF"
//! trackedPluginKey = "YurianaWench.esp"
//! triggerStage = 21
//! completionStage = 30
//! showNotification = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::host::Inspector;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "questfix.toml";

/// Tracked quest and its two stage thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuestSettings {
    pub enabled: bool,
    pub tracked_key: String,
    pub tracked_plugin_key: String,
    pub trigger_stage: i32,
    pub completion_stage: i32,
    pub show_notification: bool,
}

impl Default for QuestSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            tracked_key: "YW_Quest_MDF".to_string(),
            tracked_plugin_key: "YurianaWench.esp".to_string(),
            trigger_stage: 21,
            completion_stage: 30,
            show_notification: true,
        }
    }
}

/// Item whose arrival in the player's inventory advances the quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemSettings {
    pub enabled: bool,
    /// Hexadecimal local identifier, optionally prefixed with `XX`.
    pub item_key: String,
    pub item_plugin_key: String,
    pub item_name: String,
    pub remove_on_detection: bool,
    pub show_notification: bool,
}

impl Default for ItemSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            item_key: "625C7C".to_string(),
            item_plugin_key: "YurianaWench.esp".to_string(),
            item_name: "Lelyna's Remedy".to_string(),
            remove_on_detection: true,
            show_notification: true,
        }
    }
}

/// Player-facing message texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageSettings {
    pub enabled: bool,
    pub trigger_message: String,
    pub completion_message: String,
    pub show_trigger_message: bool,
    pub show_completion_message: bool,
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_message: "You must craft Lelyna's Remedy to cure Elora. Check your inventory for the recipe."
                .to_string(),
            completion_message:
                "You have crafted the potion and the temple girls are very happy. You have saved Elora!"
                    .to_string(),
            show_trigger_message: true,
            show_completion_message: true,
        }
    }
}

/// Poll cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitoringSettings {
    pub enabled: bool,
    pub check_interval_ms: u64,
    /// Reserved; no detection logic reads it yet.
    pub max_detection_distance: f32,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_ms: 1000,
            max_detection_distance: 5000.0,
        }
    }
}

impl MonitoringSettings {
    /// Poll interval, never shorter than one millisecond.
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(1))
    }
}

/// Master switch for transient notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Journal switches and destination overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingSettings {
    /// When false the journal keeps its ring buffers but writes no files.
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            primary_dir: None,
            secondary_dir: None,
        }
    }
}

/// Complete plugin settings. Immutable once loaded; reloads replace the whole value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "Quest")]
    pub quest: QuestSettings,
    #[serde(rename = "Item")]
    pub item: ItemSettings,
    #[serde(rename = "Messages")]
    pub messages: MessageSettings,
    #[serde(rename = "Monitoring")]
    pub monitoring: MonitoringSettings,
    #[serde(rename = "Notification")]
    pub notification: NotificationSettings,
    #[serde(rename = "Logging")]
    pub logging: LoggingSettings,
}

/// A feature switched off in memory by [`Settings::validate_against`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisabledFeature {
    pub section: &'static str,
    pub reason: String,
}

impl Settings {
    /// Parses settings from TOML text.
    pub fn from_toml_str(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Renders settings as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the default configuration to `path`, creating parent directories.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let text = Self::default().to_toml_string()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::WriteDefault {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }
        fs::write(path, text).map_err(|source| ConfigError::WriteDefault {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads settings from `path`, writing the defaults first if the file is absent.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "configuration missing, writing defaults");
            Self::write_default(path)?;
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(path, &text)
    }

    /// Disables, in memory only, every feature whose dependencies are missing.
    ///
    /// The file on disk is never rewritten. A quest whose completion stage lies
    /// below its trigger stage is treated as misconfigured as well.
    pub fn validate_against(&mut self, inspector: &dyn Inspector) -> Vec<DisabledFeature> {
        let mut disabled = Vec::new();

        if self.quest.enabled && !inspector.is_plugin_loaded(&self.quest.tracked_plugin_key) {
            self.quest.enabled = false;
            disabled.push(DisabledFeature {
                section: "Quest",
                reason: format!("plugin not found: {}", self.quest.tracked_plugin_key),
            });
        }

        if self.quest.enabled && self.quest.completion_stage < self.quest.trigger_stage {
            self.quest.enabled = false;
            disabled.push(DisabledFeature {
                section: "Quest",
                reason: format!(
                    "completion stage {} is below trigger stage {}",
                    self.quest.completion_stage, self.quest.trigger_stage
                ),
            });
        }

        if self.item.enabled && !inspector.is_plugin_loaded(&self.item.item_plugin_key) {
            self.item.enabled = false;
            disabled.push(DisabledFeature {
                section: "Item",
                reason: format!("plugin not found: {}", self.item.item_plugin_key),
            });
        }

        disabled
    }
}
