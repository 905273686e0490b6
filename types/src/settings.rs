//! The persisted settings record and partial updates to it.
//!
//! `Settings` is read and written as a whole record. Mutations arrive as a
//! `SettingsPatch` whose `None` fields leave the current value untouched, so
//! flipping one toggle can never disturb another.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which kind of help the per-field button asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Writing,
    Reading,
    Reply,
}

impl Mode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Mode::Writing => "writing",
            Mode::Reading => "reading",
            Mode::Reply => "reply",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "writing" | "write" => Some(Mode::Writing),
            "reading" | "read" => Some(Mode::Reading),
            "reply" => Some(Mode::Reply),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted settings record.
///
/// Layout on disk is the flat camelCase record
/// `{enabled, mode, showSuggestions, showToulminAnalysis, autoRewrite, enableDetection, enableChatbot}`.
/// Missing keys fall back to their defaults so older records keep loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Master kill-switch. When false no surface shows anything.
    pub enabled: bool,
    pub mode: Mode,
    pub show_suggestions: bool,
    pub show_toulmin_analysis: bool,
    pub auto_rewrite: bool,
    /// Per-field activation buttons.
    pub enable_detection: bool,
    /// Floating chat launcher and the selection affordance.
    pub enable_chatbot: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: Mode::Writing,
            show_suggestions: true,
            show_toulmin_analysis: true,
            auto_rewrite: false,
            enable_detection: true,
            enable_chatbot: true,
        }
    }
}

impl Settings {
    /// Field buttons are live.
    #[must_use]
    pub const fn detection_active(&self) -> bool {
        self.enabled && self.enable_detection
    }

    /// Chat launcher and selection affordance are live.
    #[must_use]
    pub const fn chatbot_active(&self) -> bool {
        self.enabled && self.enable_chatbot
    }

    /// Apply `patch` on top of this record.
    #[must_use]
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        Self {
            enabled: patch.enabled.unwrap_or(self.enabled),
            mode: patch.mode.unwrap_or(self.mode),
            show_suggestions: patch.show_suggestions.unwrap_or(self.show_suggestions),
            show_toulmin_analysis: patch
                .show_toulmin_analysis
                .unwrap_or(self.show_toulmin_analysis),
            auto_rewrite: patch.auto_rewrite.unwrap_or(self.auto_rewrite),
            enable_detection: patch.enable_detection.unwrap_or(self.enable_detection),
            enable_chatbot: patch.enable_chatbot.unwrap_or(self.enable_chatbot),
        }
    }
}

/// Partial update for [`Settings`]. Unknown keys are rejected at the boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_suggestions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_toulmin_analysis: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_rewrite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_detection: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_chatbot: Option<bool>,
}

/// Individual settings keys, as spelled in the persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Enabled,
    Mode,
    ShowSuggestions,
    ShowToulminAnalysis,
    AutoRewrite,
    EnableDetection,
    EnableChatbot,
}

const SETTINGS_KEYS: &[&str] = &[
    "enabled",
    "mode",
    "showSuggestions",
    "showToulminAnalysis",
    "autoRewrite",
    "enableDetection",
    "enableChatbot",
];

impl SettingsField {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let field = match raw.trim() {
            "enabled" => SettingsField::Enabled,
            "mode" => SettingsField::Mode,
            "showSuggestions" => SettingsField::ShowSuggestions,
            "showToulminAnalysis" => SettingsField::ShowToulminAnalysis,
            "autoRewrite" => SettingsField::AutoRewrite,
            "enableDetection" => SettingsField::EnableDetection,
            "enableChatbot" => SettingsField::EnableChatbot,
            _ => return None,
        };
        Some(field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsPatchError {
    #[error("unknown settings key '{0}'; expected one of: {SETTINGS_KEYS:?}")]
    UnknownKey(String),
    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
    #[error("expected key=value, got '{0}'")]
    Malformed(String),
}

impl SettingsPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Parse a single `key=value` assignment into a one-field patch.
    pub fn from_assignment(raw: &str) -> Result<Self, SettingsPatchError> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| SettingsPatchError::Malformed(raw.to_string()))?;
        let field =
            SettingsField::parse(key).ok_or_else(|| SettingsPatchError::UnknownKey(key.to_string()))?;
        let invalid = || SettingsPatchError::InvalidValue {
            key: key.trim().to_string(),
            value: value.trim().to_string(),
        };

        let mut patch = Self::default();
        let slot = match field {
            SettingsField::Mode => {
                patch.mode = Some(Mode::parse(value).ok_or_else(invalid)?);
                return Ok(patch);
            }
            SettingsField::Enabled => &mut patch.enabled,
            SettingsField::ShowSuggestions => &mut patch.show_suggestions,
            SettingsField::ShowToulminAnalysis => &mut patch.show_toulmin_analysis,
            SettingsField::AutoRewrite => &mut patch.auto_rewrite,
            SettingsField::EnableDetection => &mut patch.enable_detection,
            SettingsField::EnableChatbot => &mut patch.enable_chatbot,
        };
        *slot = Some(match value.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "1" | "yes" => true,
            "false" | "off" | "0" | "no" => false,
            _ => return Err(invalid()),
        });
        Ok(patch)
    }
}
