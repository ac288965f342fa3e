//! Cactustv-Common: Shared types, identifiers, and errors.
//!
//! This crate provides common functionality used across cactustv:
//!
//! - **Typed IDs**: [`MediaId`] and [`StreamKey`] for addressing catalog items
//!   and transcoding sessions
//! - **Core Types**: acceleration modes, catalog items, playback settings
//! - **Path Utilities**: validation of externally supplied path components
//! - **Error Handling**: the unified [`Error`] type and [`Result`] alias
//!
//! # Examples
//!
//! ```
//! use cactustv_common::{AccelerationMode, MediaId, PlaybackSettings, StreamKey};
//!
//! let id = MediaId::parse("m1").unwrap();
//! let key = StreamKey::new(id, "1080p");
//! assert_eq!(key.to_string(), "m1/1080p");
//!
//! let settings = PlaybackSettings::default();
//! let mode = AccelerationMode::effective(AccelerationMode::Cuda, &settings);
//! assert_eq!(mode, AccelerationMode::Cpu);
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
