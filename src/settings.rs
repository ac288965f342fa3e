//! User playback settings.
//!
//! [`SettingsStore`] keeps the toggles in memory behind a [`RwLock`] and
//! mirrors them to a JSON file. The file is shared with other parts of the
//! server (server URL, library paths, API keys), so unrelated fields are
//! left as they are when the playback toggles are written back.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use cactustv_common::{PlaybackSettings, PlaybackSettingsPatch};

/// Source of the per-request playback toggles.
pub trait SettingsProvider: Send + Sync {
    fn playback_settings(&self) -> PlaybackSettings;
}

impl SettingsProvider for PlaybackSettings {
    fn playback_settings(&self) -> PlaybackSettings {
        *self
    }
}

/// Playback settings with optional JSON persistence.
#[derive(Debug)]
pub struct SettingsStore {
    current: RwLock<PlaybackSettings>,
    /// Path to the settings file (None = no persistence).
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// In-memory store with the given initial value.
    pub fn new(settings: PlaybackSettings) -> Self {
        Self {
            current: RwLock::new(settings),
            path: None,
        }
    }

    /// Load from `path`, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = read_settings(&path).unwrap_or_default();
        Self {
            current: RwLock::new(settings),
            path: Some(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Snapshot of the current settings.
    pub fn get(&self) -> PlaybackSettings {
        *self.current.read()
    }

    /// Merge a partial update and persist it. Returns the new settings.
    pub fn update(&self, patch: PlaybackSettingsPatch) -> PlaybackSettings {
        let updated = {
            let mut current = self.current.write();
            current.merge(patch);
            *current
        };
        tracing::info!(
            transcoding_enabled = updated.transcoding_enabled,
            hardware_acceleration = updated.hardware_acceleration,
            "Playback settings updated"
        );
        self.persist(&updated);
        updated
    }

    /// Write the settings back to the file.
    ///
    /// This is a best-effort operation; errors are logged but not propagated.
    fn persist(&self, settings: &PlaybackSettings) {
        let Some(ref path) = self.path else {
            return;
        };

        let mut doc = std::fs::read_to_string(path)
            .ok()
            .and_then(|c| serde_json::from_str::<serde_json::Value>(&c).ok())
            .and_then(|v| match v {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();

        if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(settings) {
            doc.extend(fields);
        }

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create settings directory {}: {e}", parent.display());
                return;
            }
        }

        match serde_json::to_string_pretty(&serde_json::Value::Object(doc)) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    tracing::warn!("Failed to persist settings to {}: {e}", path.display());
                }
            }
            Err(e) => {
                tracing::warn!("Failed to serialize settings: {e}");
            }
        }
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(PlaybackSettings::default())
    }
}

impl SettingsProvider for SettingsStore {
    fn playback_settings(&self) -> PlaybackSettings {
        self.get()
    }
}

fn read_settings(path: &Path) -> Option<PlaybackSettings> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!("Failed to read settings from {}: {e}", path.display());
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(settings) => Some(settings),
        Err(e) => {
            tracing::warn!("Invalid settings file {}: {e}", path.display());
            None
        }
    }
}
