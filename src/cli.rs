//! Command-line interface for readaloud
//!
//! Provides argument parsing using clap derive macros.

use crate::config::SpeechService;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Read documents aloud with a synchronized reading-position highlight
#[derive(Parser, Debug)]
#[command(
    name = "readaloud",
    version,
    about = "Read documents aloud with a synchronized highlight"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Speech service override (local, cloud, openai)
    #[arg(long, global = true, value_name = "SERVICE")]
    pub service: Option<SpeechService>,

    /// Voice of the selected service
    #[arg(long, global = true, value_name = "VOICE")]
    pub voice: Option<String>,

    /// Playback speed multiplier (0.25 to 4.0)
    #[arg(long, global = true, value_name = "SPEED")]
    pub speed: Option<f32>,

    /// Remote request timeout. Examples: 30s, 2m
    #[arg(long, global = true, value_name = "DURATION", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: playback events, -vv: configuration details)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a timeout string.
///
/// Supports any duration format accepted by `humantime`; a bare number is
/// taken as seconds.
fn parse_timeout(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a file (or stdin) aloud
    Read {
        /// Text file to read; stdin when omitted
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Print the paragraph and word segmentation as JSON
    Paragraphs {
        /// Text file to segment; stdin when omitted
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// View and create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the configuration file path
    Path,
    /// Show the effective configuration (API keys masked)
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
