mod cli;

use cactustv::{config, server};
use cactustv_av::{format_command_line, profiles, PlanBuilder};
use cactustv_common::AccelerationMode;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting Cactustv server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );
    tracing::info!(
        "Transcoding: mode={}, temp_dir={:?}",
        config.streaming.hwaccel,
        config.streaming.temp_dir
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            // Verbose mode: trace for cactustv, debug for HTTP
            "cactustv=trace,cactustv_av=debug,cactustv_common=debug,tower_http=debug".to_string()
        } else {
            // Normal mode: debug for cactustv crates, info for HTTP requests
            "cactustv=debug,cactustv_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            // Create tokio runtime
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Plan {
            input,
            quality,
            mode,
            output,
        } => print_plan(&input, &quality, mode.as_deref(), output, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate { config } => {
            validate_config(config.as_deref().or(cli.config.as_deref()))
        }
        Commands::Version => {
            println!("cactustv {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn print_plan(
    input: &Path,
    quality: &str,
    mode: Option<&str>,
    output: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !input.exists() {
        tracing::warn!("Input file does not exist: {:?}", input);
    }

    let mode = match mode {
        Some(m) => m.parse::<AccelerationMode>()?,
        None => config.streaming.hwaccel,
    };
    let profile = profiles::resolve(quality);
    let output = output.unwrap_or_else(|| config.streaming.temp_dir.join("plan").join(profile.label));

    let plan = PlanBuilder::new()
        .with_vaapi_device(&config.streaming.vaapi_device)
        .build(mode, profile);
    let args = config
        .streaming
        .hls_output()
        .command_args(&plan, input, &output);

    let ffmpeg = cactustv_av::get_tool_path("ffmpeg", config.tools.ffmpeg_path.as_deref())
        .unwrap_or_else(|_| PathBuf::from("ffmpeg"));

    println!("Mode: {}", plan.mode);
    println!(
        "Quality: {} ({} @ {})",
        profile.label,
        profile.size(),
        profile.bitrate()
    );
    println!("Video codec: {}", plan.video_codec);
    println!();
    println!("{}", format_command_line(&ffmpeg, &args));

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let tools = cactustv_av::check_tools(config.tools.ffmpeg_path.as_deref());
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable transcoding.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, searching default locations");
            config::load_config_or_default(None)?
        }
    };

    println!("✓ Configuration is valid");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    if let Some(ref dir) = config.server.static_dir {
        println!("  Static files: {:?}", dir);
    }
    println!("  Temp dir: {:?}", config.streaming.temp_dir);
    println!("  Acceleration: {}", config.streaming.hwaccel);
    println!(
        "  Ready timeout: {}s (poll every {}ms, kill on timeout: {})",
        config.streaming.ready_timeout_secs,
        config.streaming.poll_interval_ms,
        config.streaming.kill_on_timeout
    );
    println!(
        "  Segments: {}s under {}",
        config.streaming.segment_duration_secs, config.streaming.stream_base
    );
    println!("  Catalog: {:?}", config.library.catalog_path);

    Ok(())
}
