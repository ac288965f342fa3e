//! Encoder plans.
//!
//! An [`EncoderPlan`] is the mode-specific part of an ffmpeg invocation: the
//! input (decoder) flags, the video encoder and the output flags. Every plan
//! targets H.264 tuned for segmented delivery: a fixed keyframe interval,
//! no scene-cut keyframes, no subtitle streams, no metadata and 8-bit 4:2:0
//! output.

use serde::Serialize;
use std::path::{Path, PathBuf};

use cactustv_common::AccelerationMode;

use crate::profiles::QualityProfile;

/// Keyframe interval in frames (~2 s at 24 fps).
pub const KEYFRAME_INTERVAL: u32 = 48;

/// Render node used for VA-API when none is configured.
pub const DEFAULT_VAAPI_DEVICE: &str = "/dev/dri/renderD128";

/// Concrete encoder arguments for one (mode, profile) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncoderPlan {
    pub mode: AccelerationMode,
    pub profile: QualityProfile,
    /// Flags placed before `-i`.
    pub input_args: Vec<String>,
    /// Value for `-c:v`.
    pub video_codec: &'static str,
    /// Video output flags placed after the codec selection.
    pub output_args: Vec<String>,
}

/// Builds [`EncoderPlan`]s.
///
/// Holds the only environment-dependent input, the VA-API device node, so
/// that [`PlanBuilder::build`] stays a pure function of its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanBuilder {
    vaapi_device: PathBuf,
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self {
            vaapi_device: PathBuf::from(DEFAULT_VAAPI_DEVICE),
        }
    }
}

impl PlanBuilder {
    /// Create a builder with the default VA-API device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different VA-API render node.
    pub fn with_vaapi_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.vaapi_device = device.into();
        self
    }

    /// The VA-API render node plans will reference.
    pub fn vaapi_device(&self) -> &Path {
        &self.vaapi_device
    }

    /// Build the plan for `mode` and `profile`.
    pub fn build(&self, mode: AccelerationMode, profile: &QualityProfile) -> EncoderPlan {
        let (input_args, video_codec, mut output_args) = match mode {
            AccelerationMode::Cpu => (
                Vec::new(),
                "libx264",
                args([
                    "-preset",
                    "veryfast",
                    "-vf",
                    &format!("scale={}:{}", profile.width, profile.height),
                    "-pix_fmt",
                    "yuv420p",
                ]),
            ),
            AccelerationMode::Cuda => (
                args(["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"]),
                "h264_nvenc",
                args([
                    "-preset",
                    "p4",
                    "-tune",
                    "hq",
                    "-vf",
                    &format!(
                        "scale_cuda=w={}:h={}:format=yuv420p",
                        profile.width, profile.height
                    ),
                ]),
            ),
            AccelerationMode::Qsv => (
                args(["-hwaccel", "qsv"]),
                "h264_qsv",
                args([
                    "-preset",
                    "veryfast",
                    "-look_ahead",
                    "0",
                    "-s",
                    &profile.size(),
                    "-pix_fmt",
                    "nv12",
                ]),
            ),
            AccelerationMode::Vaapi => (
                args([
                    "-hwaccel",
                    "vaapi",
                    "-hwaccel_output_format",
                    "vaapi",
                    "-vaapi_device",
                    &self.vaapi_device.to_string_lossy(),
                ]),
                "h264_vaapi",
                args([
                    "-vf",
                    &format!(
                        "format=nv12|vaapi,hwupload,scale_vaapi=w={}:h={}:format=nv12",
                        profile.width, profile.height
                    ),
                ]),
            ),
        };

        output_args.extend(rate_control(profile));
        output_args.extend(segment_tuning());

        EncoderPlan {
            mode,
            profile: *profile,
            input_args,
            video_codec,
            output_args,
        }
    }
}

/// Build a plan with the default [`PlanBuilder`].
pub fn build_plan(mode: AccelerationMode, profile: &QualityProfile) -> EncoderPlan {
    PlanBuilder::default().build(mode, profile)
}

fn rate_control(profile: &QualityProfile) -> Vec<String> {
    let bitrate = profile.bitrate();
    args([
        "-b:v",
        &bitrate,
        "-maxrate:v",
        &bitrate,
        "-bufsize:v",
        &profile.bufsize(),
    ])
}

fn segment_tuning() -> Vec<String> {
    args([
        "-g",
        &KEYFRAME_INTERVAL.to_string(),
        "-sc_threshold",
        "0",
        "-sn",
        "-map_metadata",
        "-1",
    ])
}

fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles;

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn cpu_720p_targets_profile() {
        let plan = build_plan(AccelerationMode::Cpu, profiles::resolve("720p"));
        assert_eq!(plan.video_codec, "libx264");
        assert!(plan.input_args.is_empty());
        assert!(has_pair(&plan.output_args, "-b:v", "4500k"));
        assert!(has_pair(&plan.output_args, "-bufsize:v", "9000k"));
        assert!(has_pair(&plan.output_args, "-vf", "scale=1280:720"));
        assert!(has_pair(&plan.output_args, "-pix_fmt", "yuv420p"));
        assert_eq!(plan.profile.size(), "1280x720");
    }

    #[test]
    fn every_mode_carries_segment_tuning() {
        let profile = profiles::resolve("1080p");
        for mode in AccelerationMode::ALL {
            let plan = build_plan(mode, profile);
            assert!(has_pair(&plan.output_args, "-g", "48"), "{mode}");
            assert!(has_pair(&plan.output_args, "-sc_threshold", "0"), "{mode}");
            assert!(has_pair(&plan.output_args, "-map_metadata", "-1"), "{mode}");
            assert!(plan.output_args.iter().any(|a| a == "-sn"), "{mode}");
            assert!(has_pair(&plan.output_args, "-b:v", "8000k"), "{mode}");
        }
    }

    #[test]
    fn cuda_scales_on_gpu() {
        let plan = build_plan(AccelerationMode::Cuda, profiles::resolve("480p"));
        assert_eq!(plan.video_codec, "h264_nvenc");
        assert!(has_pair(&plan.input_args, "-hwaccel", "cuda"));
        assert!(has_pair(&plan.input_args, "-hwaccel_output_format", "cuda"));
        assert!(has_pair(
            &plan.output_args,
            "-vf",
            "scale_cuda=w=854:h=480:format=yuv420p"
        ));
    }

    #[test]
    fn qsv_uses_nv12() {
        let plan = build_plan(AccelerationMode::Qsv, profiles::resolve("720p"));
        assert_eq!(plan.video_codec, "h264_qsv");
        assert!(has_pair(&plan.input_args, "-hwaccel", "qsv"));
        assert!(has_pair(&plan.output_args, "-pix_fmt", "nv12"));
        assert!(has_pair(&plan.output_args, "-s", "1280x720"));
    }

    #[test]
    fn vaapi_uploads_and_uses_configured_device() {
        let builder = PlanBuilder::new().with_vaapi_device("/dev/dri/renderD129");
        let plan = builder.build(AccelerationMode::Vaapi, profiles::resolve("360p"));
        assert_eq!(plan.video_codec, "h264_vaapi");
        assert!(has_pair(&plan.input_args, "-vaapi_device", "/dev/dri/renderD129"));
        let filter = plan
            .output_args
            .windows(2)
            .find(|w| w[0] == "-vf")
            .map(|w| w[1].clone())
            .unwrap();
        assert!(filter.contains("hwupload"));
        assert!(filter.contains("scale_vaapi=w=640:h=360"));
    }

    #[test]
    fn plans_are_deterministic() {
        let builder = PlanBuilder::new();
        for profile in profiles::all() {
            for mode in AccelerationMode::ALL {
                assert_eq!(builder.build(mode, profile), builder.build(mode, profile));
            }
        }
    }
}
