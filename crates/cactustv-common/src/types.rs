//! Core type definitions for catalog items, playback settings and encoding.
//!
//! All enums are serialized in lowercase so they can be written by hand in
//! config files and environment variables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::MediaId;

/// Which encoding path the external encoder uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccelerationMode {
    /// Software H.264, always available.
    #[default]
    Cpu,
    /// NVIDIA NVENC.
    Cuda,
    /// Intel QuickSync.
    Qsv,
    /// Generic VA-API.
    Vaapi,
}

impl AccelerationMode {
    /// All modes, in preference order for display.
    pub const ALL: [AccelerationMode; 4] = [Self::Cpu, Self::Cuda, Self::Qsv, Self::Vaapi];

    /// The mode a session should actually use.
    ///
    /// The process-wide `configured` mode only applies when the user has both
    /// transcoding and hardware acceleration turned on; otherwise the session
    /// falls back to [`AccelerationMode::Cpu`].
    pub fn effective(configured: AccelerationMode, settings: &PlaybackSettings) -> Self {
        if settings.transcoding_enabled && settings.hardware_acceleration {
            configured
        } else {
            Self::Cpu
        }
    }

    /// Whether this mode needs a GPU.
    pub fn is_hardware(self) -> bool {
        !matches!(self, Self::Cpu)
    }
}

impl fmt::Display for AccelerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::Qsv => write!(f, "qsv"),
            Self::Vaapi => write!(f, "vaapi"),
        }
    }
}

impl std::str::FromStr for AccelerationMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cpu" | "software" => Ok(Self::Cpu),
            "cuda" | "nvenc" => Ok(Self::Cuda),
            "qsv" | "quicksync" => Ok(Self::Qsv),
            "vaapi" => Ok(Self::Vaapi),
            other => Err(crate::Error::invalid_input(format!(
                "unknown acceleration mode: {other}"
            ))),
        }
    }
}

/// A catalog entry as seen by the streaming core. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Catalog identifier.
    pub id: MediaId,
    /// Absolute path of the source file.
    pub path: PathBuf,
    /// Display title.
    pub title: String,
    /// Duration in seconds, when known.
    #[serde(default)]
    pub duration: Option<f64>,
}

/// User-facing playback toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSettings {
    /// Whether on-demand transcoding is enabled.
    #[serde(default = "default_true")]
    pub transcoding_enabled: bool,
    /// Whether the configured hardware encoder may be used.
    #[serde(default)]
    pub hardware_acceleration: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            transcoding_enabled: true,
            hardware_acceleration: false,
        }
    }
}

/// Partial update for [`PlaybackSettings`]; absent fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSettingsPatch {
    #[serde(default)]
    pub transcoding_enabled: Option<bool>,
    #[serde(default)]
    pub hardware_acceleration: Option<bool>,
}

impl PlaybackSettings {
    /// Apply a partial update.
    pub fn merge(&mut self, patch: PlaybackSettingsPatch) {
        if let Some(v) = patch.transcoding_enabled {
            self.transcoding_enabled = v;
        }
        if let Some(v) = patch.hardware_acceleration {
            self.hardware_acceleration = v;
        }
    }
}
