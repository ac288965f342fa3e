//! # cactustv-av
//!
//! Everything cactustv knows about the external encoder that does not need a
//! runtime.
//!
//! This crate provides:
//!
//! - **Quality profiles** ([`profiles`]) -- the static label → bitrate/size
//!   table, with total lookup that falls back to `720p`.
//! - **Encoder plans** ([`PlanBuilder`], [`build_plan`]) -- the ffmpeg input
//!   flags, video codec and output flags for an acceleration mode and a
//!   profile. Pure: never touches the filesystem or a process table.
//! - **HLS output layout** ([`HlsOutput`]) -- segment duration, playlist
//!   length, segment container and file names, plus assembly of the complete
//!   argument vector.
//! - **Tool discovery** ([`tools`]) -- locate `ffmpeg` from config or `PATH`.
//!
//! ## Example
//!
//! ```
//! use cactustv_av::{build_plan, profiles, HlsOutput};
//! use cactustv_common::AccelerationMode;
//! use std::path::Path;
//!
//! let profile = profiles::resolve("1080p");
//! let plan = build_plan(AccelerationMode::Cpu, profile);
//! let args = HlsOutput::default().command_args(
//!     &plan,
//!     Path::new("/media/movie.mkv"),
//!     Path::new("/tmp/segments/m1/1080p"),
//! );
//! assert!(args.iter().any(|a| a == "libx264"));
//! ```

mod error;
pub mod hls;
pub mod plan;
pub mod profiles;
pub mod tools;

// Re-exports
pub use error::{Error, Result};
pub use hls::{format_command_line, HlsOutput, MANIFEST_NAME, SEGMENT_PATTERN};
pub use plan::{build_plan, EncoderPlan, PlanBuilder, DEFAULT_VAAPI_DEVICE, KEYFRAME_INTERVAL};
pub use profiles::{QualityProfile, DEFAULT_QUALITY};
pub use tools::{check_tool, check_tools, get_tool_path, ToolInfo};
