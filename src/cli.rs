use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cactustv")]
#[command(author, version, about = "Personal media server with on-demand HLS transcoding")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the encoder command line for a file without running it
    Plan {
        /// Source media file
        #[arg(required = true)]
        input: PathBuf,

        /// Quality label (unknown labels fall back to 720p)
        #[arg(short, long, default_value = "720p")]
        quality: String,

        /// Acceleration mode (defaults to the configured mode)
        #[arg(short, long)]
        mode: Option<String>,

        /// Output directory (defaults to <temp_dir>/plan/<quality>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
