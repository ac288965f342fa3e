//! Quality profiles.
//!
//! A profile names a target video bitrate and frame size. The table is fixed
//! at compile time and lookups are total: anything unrecognised resolves to
//! the [`DEFAULT_QUALITY`] profile.

use serde::Serialize;

/// Label of the profile used when a request names no (or an unknown) quality.
pub const DEFAULT_QUALITY: &str = "720p";

/// Target bitrate and frame size for a transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct QualityProfile {
    /// Label used in URLs and directory names (e.g. "1080p").
    pub label: &'static str,
    /// Target video bitrate in kbit/s.
    pub bitrate_kbps: u32,
    /// Output frame width in pixels.
    pub width: u32,
    /// Output frame height in pixels.
    pub height: u32,
}

impl QualityProfile {
    /// Bitrate in ffmpeg notation, e.g. `4500k`.
    pub fn bitrate(&self) -> String {
        format!("{}k", self.bitrate_kbps)
    }

    /// Rate-control buffer size: two seconds worth of bitrate.
    pub fn bufsize(&self) -> String {
        format!("{}k", self.bitrate_kbps * 2)
    }

    /// Frame size in ffmpeg notation, e.g. `1280x720`.
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

static PROFILES: [QualityProfile; 4] = [
    QualityProfile {
        label: "1080p",
        bitrate_kbps: 8000,
        width: 1920,
        height: 1080,
    },
    QualityProfile {
        label: "720p",
        bitrate_kbps: 4500,
        width: 1280,
        height: 720,
    },
    QualityProfile {
        label: "480p",
        bitrate_kbps: 1500,
        width: 854,
        height: 480,
    },
    QualityProfile {
        label: "360p",
        bitrate_kbps: 800,
        width: 640,
        height: 360,
    },
];

/// All known profiles, highest quality first.
pub fn all() -> &'static [QualityProfile] {
    &PROFILES
}

/// Labels of all known profiles.
pub fn labels() -> impl Iterator<Item = &'static str> {
    PROFILES.iter().map(|p| p.label)
}

/// Strict lookup by label (case-insensitive).
pub fn lookup(label: &str) -> Option<&'static QualityProfile> {
    let label = label.trim();
    PROFILES.iter().find(|p| p.label.eq_ignore_ascii_case(label))
}

/// Resolve a label to a profile, defaulting to [`DEFAULT_QUALITY`].
pub fn resolve(label: &str) -> &'static QualityProfile {
    lookup(label).unwrap_or_else(default_profile)
}

/// The default profile.
pub fn default_profile() -> &'static QualityProfile {
    // PROFILES[1] is DEFAULT_QUALITY; checked by `default_profile_is_720p`.
    &PROFILES[1]
}
