//! HLS output layout and ffmpeg argument assembly.
//!
//! Every session writes a live-style playlist ([`MANIFEST_NAME`]) and
//! numbered MPEG-TS segments ([`SEGMENT_PATTERN`]) into its own directory.

use std::path::Path;

use crate::plan::EncoderPlan;

/// File name of the playlist inside a session directory.
pub const MANIFEST_NAME: &str = "index.m3u8";

/// ffmpeg pattern for segment file names inside a session directory.
pub const SEGMENT_PATTERN: &str = "seg_%03d.ts";

/// HLS muxer settings shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HlsOutput {
    /// Target segment duration in seconds.
    pub segment_duration: u32,
    /// Maximum playlist entries; 0 keeps every segment.
    pub list_size: u32,
    /// Segment container passed to `-hls_segment_type`.
    pub segment_type: &'static str,
}

impl Default for HlsOutput {
    fn default() -> Self {
        Self {
            segment_duration: 4,
            list_size: 0,
            segment_type: "mpegts",
        }
    }
}

impl HlsOutput {
    /// Full ffmpeg argument vector (without the program name).
    ///
    /// Selects the first video and, when present, the first audio stream of
    /// `source`. Audio is stream-copied.
    pub fn command_args(&self, plan: &EncoderPlan, source: &Path, output_dir: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-y", "-loglevel", "error"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        args.extend(plan.input_args.iter().cloned());
        args.push("-i".into());
        args.push(source.to_string_lossy().into_owned());

        args.extend(["-map", "0:v:0", "-map", "0:a:0?"].map(String::from));
        args.extend(["-c:v".to_string(), plan.video_codec.to_string()]);
        args.extend(["-c:a", "copy"].map(String::from));
        args.extend(plan.output_args.iter().cloned());

        args.extend(["-f", "hls"].map(String::from));
        args.push("-hls_time".into());
        args.push(self.segment_duration.to_string());
        args.push("-hls_list_size".into());
        args.push(self.list_size.to_string());
        args.push("-hls_segment_type".into());
        args.push(self.segment_type.into());
        args.push("-hls_segment_filename".into());
        args.push(output_dir.join(SEGMENT_PATTERN).to_string_lossy().into_owned());
        args.push(output_dir.join(MANIFEST_NAME).to_string_lossy().into_owned());
        args
    }
}

/// Render a command line for logs and the `plan` subcommand.
///
/// Arguments containing whitespace or shell metacharacters are single-quoted.
pub fn format_command_line(program: &Path, args: &[String]) -> String {
    std::iter::once(program.to_string_lossy().into_owned())
        .chain(args.iter().cloned())
        .map(|a| {
            if a.is_empty() || a.contains(|c: char| c.is_whitespace() || "'\"|&;$?*".contains(c)) {
                format!("'{}'", a.replace('\'', r"'\''"))
            } else {
                a
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
