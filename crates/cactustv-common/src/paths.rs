//! Path utilities for externally supplied path components.
//!
//! Media ids, quality labels and segment names arrive from HTTP requests and
//! end up joined onto the segment root. These helpers make sure each of them
//! is a single, plain path component.

use std::path::Path;

/// File extensions the segment store serves.
const STREAM_EXTENSIONS: &[&str] = &["m3u8", "ts"];

/// Check whether `s` can be joined onto a directory without escaping it.
///
/// # Examples
///
/// ```
/// use cactustv_common::paths::is_safe_component;
///
/// assert!(is_safe_component("seg_001.ts"));
/// assert!(!is_safe_component("../etc/passwd"));
/// assert!(!is_safe_component(""));
/// ```
pub fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && !s.contains(['/', '\\', '\0'])
}

/// Validate that `s` is a safe path component.
pub fn require_safe_component<'a>(what: &str, s: &'a str) -> crate::Result<&'a str> {
    if is_safe_component(s) {
        Ok(s)
    } else {
        Err(crate::Error::invalid_input(format!("invalid {what}: {s:?}")))
    }
}

/// Check if a path names a stream artifact (manifest or transport-stream segment).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use cactustv_common::paths::is_stream_file;
///
/// assert!(is_stream_file(Path::new("index.m3u8")));
/// assert!(is_stream_file(Path::new("seg_000.ts")));
/// assert!(!is_stream_file(Path::new("movie.mkv")));
/// ```
pub fn is_stream_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| STREAM_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Content type for a stream artifact, by extension.
pub fn stream_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        _ => "application/octet-stream",
    }
}
