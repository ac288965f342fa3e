//! Typed identifiers.
//!
//! Catalog ids are opaque strings chosen by the library scanner. Because they
//! are also used as directory names in the segment store, a [`MediaId`] can
//! only be built from a string that is a single safe path component.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::paths::is_safe_component;

/// Identifier of a catalog media item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MediaId(String);

impl MediaId {
    /// Parse a media id, rejecting values that are not a single path component.
    pub fn parse(s: impl Into<String>) -> crate::Result<Self> {
        let s = s.into();
        if is_safe_component(&s) {
            Ok(Self(s))
        } else {
            Err(crate::Error::invalid_input(format!("invalid media id: {s:?}")))
        }
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MediaId {
    type Error = crate::Error;

    fn try_from(s: String) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl From<MediaId> for String {
    fn from(id: MediaId) -> Self {
        id.0
    }
}

impl std::str::FromStr for MediaId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for MediaId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a transcoding session: one media item at one quality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    /// The media item being transcoded.
    pub media_id: MediaId,
    /// The quality label (always a known profile label).
    pub quality: String,
}

impl StreamKey {
    /// Build a key from a media id and a quality label.
    pub fn new(media_id: MediaId, quality: impl Into<String>) -> Self {
        Self {
            media_id,
            quality: quality.into(),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.media_id, self.quality)
    }
}
