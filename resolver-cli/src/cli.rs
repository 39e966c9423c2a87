use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use platforms_resolver::{Platform, ResolverError};

#[derive(Parser)]
#[command(
    name = "vresolve",
    version,
    about = "Resolve Twitch and YouTube videos to playable media",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "VRESOLVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Extraction service base URL
    #[arg(long, global = true, env = "VRESOLVE_EXTRACTION_URL")]
    pub extraction_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Attempts of the Twitch manifest pipeline
    #[arg(long, global = true)]
    pub retries: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a video or channel URL to playable media
    Resolve {
        /// Twitch or YouTube URL
        url: String,

        /// Preferred quality: `best`, `audio_only` or a name such as `720p60`
        #[arg(short = 'Q', long, default_value = "best")]
        quality: String,

        /// Print only the selected URL
        #[arg(long)]
        url_only: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,

        /// Write output to this file instead of stdout
        #[arg(long)]
        output_file: Option<PathBuf>,
    },

    /// Sign in with the OAuth device flow
    Login {
        #[arg(value_parser = parse_platform)]
        platform: Platform,
    },

    /// Show which followed channels are live
    Live {
        #[arg(value_parser = parse_platform)]
        platform: Platform,

        /// Include offline channels
        #[arg(short, long)]
        all: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        output: OutputFormat,
    },

    /// Forget stored credentials
    Logout {
        #[arg(value_parser = parse_platform)]
        platform: Platform,
    },

    /// Show the effective configuration
    Config {
        /// Write a default configuration file if none exists
        #[arg(long)]
        init: bool,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Pretty,
    /// Indented JSON
    Json,
    /// Single-line JSON
    JsonCompact,
}

impl Commands {
    pub fn output_format(&self) -> Option<OutputFormat> {
        match self {
            Commands::Resolve { output, .. } | Commands::Live { output, .. } => Some(*output),
            _ => None,
        }
    }
}

fn parse_platform(value: &str) -> Result<Platform, String> {
    value.parse().map_err(|e: ResolverError| e.to_string())
}
