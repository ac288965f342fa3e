mod types;

pub use types::*;

use anyhow::{Context, Result};
use cactustv_common::AccelerationMode;
use std::path::Path;

/// Environment variable selecting the process-wide acceleration mode.
pub const HWACCEL_ENV: &str = "FFMPEG_HWACCEL";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./cactustv.toml",
        "~/.config/cactustv/config.toml",
        "/etc/cactustv/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

/// Apply environment overrides on top of file values.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(value) = std::env::var(HWACCEL_ENV) {
        if !value.trim().is_empty() {
            config.streaming.hwaccel = value
                .parse::<AccelerationMode>()
                .with_context(|| format!("Invalid {HWACCEL_ENV} value: {value:?}"))?;
        }
    }
    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    let streaming = &config.streaming;
    if streaming.ready_timeout_secs == 0 {
        anyhow::bail!("streaming.ready_timeout_secs must be greater than 0");
    }
    if streaming.poll_interval_ms == 0 {
        anyhow::bail!("streaming.poll_interval_ms must be greater than 0");
    }
    if streaming.poll_interval() >= streaming.ready_timeout() {
        anyhow::bail!("streaming.poll_interval_ms must be smaller than the ready timeout");
    }
    if streaming.segment_duration_secs == 0 {
        anyhow::bail!("streaming.segment_duration_secs must be greater than 0");
    }
    if !streaming.stream_base.starts_with('/') {
        anyhow::bail!(
            "streaming.stream_base must start with '/': {:?}",
            streaming.stream_base
        );
    }

    if let Some(dir) = &config.server.static_dir {
        if !dir.exists() {
            tracing::warn!("Static directory does not exist: {:?}", dir);
        }
    }

    if streaming.hwaccel == AccelerationMode::Vaapi && !streaming.vaapi_device.exists() {
        tracing::warn!("VA-API device does not exist: {:?}", streaming.vaapi_device);
    }

    Ok(())
}
