//! User settings blob
//!
//! Settings are persisted as a single JSON document under a fixed key.
//! Decoding is field-by-field: a stored value wins only when it is present
//! and well typed, everything else falls back to the default. A corrupt
//! blob therefore never locks a user out of the settings screen.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use utoipa::ToSchema;

/// Storage key of the settings blob
pub const SETTINGS_KEY: &str = "animeflow_settings_v1";

/// UI colour scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    fn from_value(value: &Value) -> Option<Self> {
        match value.as_str()? {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

/// Persisted user preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme: Theme,
    pub language: String,
    pub notifications: bool,
    pub auto_play: bool,
    pub video_quality: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            language: "en".to_string(),
            notifications: true,
            auto_play: true,
            video_quality: "720p".to_string(),
        }
    }
}

impl Settings {
    /// Decode a stored blob, keeping defaults for anything missing or invalid
    pub fn from_blob(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Self::default().merged_with(&map),
            Ok(_) => {
                warn!("Settings blob is not a JSON object, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!("Malformed settings blob, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Encode for storage
    pub fn to_blob(&self) -> String {
        serde_json::to_value(self)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| "{}".to_string())
    }

    fn merged_with(mut self, map: &Map<String, Value>) -> Self {
        if let Some(theme) = map.get("theme").and_then(Theme::from_value) {
            self.theme = theme;
        }
        if let Some(language) = non_empty_str(map.get("language")) {
            self.language = language;
        }
        if let Some(flag) = map.get("notifications").and_then(Value::as_bool) {
            self.notifications = flag;
        }
        if let Some(flag) = map.get("autoPlay").and_then(Value::as_bool) {
            self.auto_play = flag;
        }
        if let Some(quality) = non_empty_str(map.get("videoQuality")) {
            self.video_quality = quality;
        }
        self
    }

    /// Apply a partial update from the settings screen
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(language) = patch.language.filter(|l| !l.trim().is_empty()) {
            self.language = language.trim().to_string();
        }
        if let Some(flag) = patch.notifications {
            self.notifications = flag;
        }
        if let Some(flag) = patch.auto_play {
            self.auto_play = flag;
        }
        if let Some(quality) = patch.video_quality.filter(|q| !q.trim().is_empty()) {
            self.video_quality = quality.trim().to_string();
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Partial settings update; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub theme: Option<Theme>,
    pub language: Option<String>,
    pub notifications: Option<bool>,
    pub auto_play: Option<bool>,
    pub video_quality: Option<String>,
}
