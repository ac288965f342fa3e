//! On-demand HLS transcoding.
//!
//! A play request for `(media, quality)` is turned into at most one running
//! encoder, whatever the number of concurrent viewers. Components, leaf
//! first:
//!
//! - [`SegmentStore`]: on-disk layout `<temp>/<media>/<quality>/`.
//! - [`SessionRegistry`]: one [`Session`] per stream key, with the atomic
//!   acquire-or-join decision and a shared readiness signal.
//! - [`TranscodeSupervisor`]: runs and watches the encoder
//!   ([`FfmpegSupervisor`] in production).
//! - [`StreamingService`]: `prepare_stream`, `segment_path`, `kill_stream`.

mod facade;
mod registry;
mod store;
mod supervisor;

pub use facade::{StreamingOptions, StreamingService, KILL_GRACE};
pub use registry::{
    Acquired, Readiness, Session, SessionInfo, SessionRegistry, StoppedMedia, KILLED_REASON,
};
pub use store::SegmentStore;
pub use supervisor::{FfmpegSupervisor, TranscodeJob, TranscodeSupervisor};
