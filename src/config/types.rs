use cactustv_av::HlsOutput;
use cactustv_common::AccelerationMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub streaming: StreamingConfig,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional SPA build directory served as the fallback route
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Root of the generated segment tree. Emptied on every start.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Process-wide acceleration mode (overridden by `FFMPEG_HWACCEL`)
    #[serde(default)]
    pub hwaccel: AccelerationMode,

    /// Render node for VA-API sessions
    #[serde(default = "default_vaapi_device")]
    pub vaapi_device: PathBuf,

    /// How long a play request waits for the first manifest
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,

    /// How often the manifest is checked while a session is starting
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Kill a session when a play request gives up waiting on it
    #[serde(default)]
    pub kill_on_timeout: bool,

    /// URL prefix under which stream paths are published
    #[serde(default = "default_stream_base")]
    pub stream_base: String,

    /// Target HLS segment length
    #[serde(default = "default_segment_duration")]
    pub segment_duration_secs: u32,
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./temp")
}

fn default_vaapi_device() -> PathBuf {
    PathBuf::from(cactustv_av::DEFAULT_VAAPI_DEVICE)
}

fn default_ready_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    500
}

fn default_stream_base() -> String {
    "/api/play".to_string()
}

fn default_segment_duration() -> u32 {
    4
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            hwaccel: AccelerationMode::default(),
            vaapi_device: default_vaapi_device(),
            ready_timeout_secs: default_ready_timeout(),
            poll_interval_ms: default_poll_interval(),
            kill_on_timeout: false,
            stream_base: default_stream_base(),
            segment_duration_secs: default_segment_duration(),
        }
    }
}

impl StreamingConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Muxer settings for every session.
    pub fn hls_output(&self) -> HlsOutput {
        HlsOutput {
            segment_duration: self.segment_duration_secs,
            ..HlsOutput::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// JSON document written by the library scanner
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// JSON document holding the user's playback toggles
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("./data/db.json")
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            settings_path: Some(PathBuf::from("./data/settings.json")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}
