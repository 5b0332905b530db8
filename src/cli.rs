//! Command-line interface for voxlink
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Two-node speech relay over a serial link
#[derive(Parser, Debug)]
#[command(
    name = "voxlink",
    version,
    about = "Two-node speech relay over a serial link"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress status output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Serial port for the inter-node link (e.g., /dev/ttyUSB0)
    #[arg(long, global = true, value_name = "PORT")]
    pub port: Option<String>,

    /// Translation service endpoint URL
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,
}

/// Parse an interval string into milliseconds.
///
/// Supports any duration format accepted by `humantime`: bare numbers
/// (seconds), single-unit (`5s`, `2m`), and compound (`1m30s`).
pub fn parse_interval_ms(s: &str) -> Result<u64, String> {
    let s = s.trim();
    // Bare number → seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs * 1_000);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_millis() as u64)
        .map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the capture node: record, translate, forward over the link
    Capture {
        /// Send a WAV file from disk instead of recording
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Exit after one cycle (default: loop continuously)
        #[arg(long)]
        once: bool,

        /// Operating mode override (push or poll)
        #[arg(long, value_name = "MODE")]
        mode: Option<String>,

        /// Cycle interval override. Examples: 5s, 30s, 2m
        #[arg(long, value_name = "DURATION", value_parser = parse_interval_ms)]
        interval: Option<u64>,

        /// Audio input device name
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,
    },

    /// Run the speaker node: receive from the link and play
    Speak {
        /// Also save each received clip under this directory
        #[arg(long, value_name = "DIR")]
        save: Option<PathBuf>,

        /// Audio output device name
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,
    },

    /// List available audio devices
    Devices,

    /// List serial ports
    Ports,

    /// Manage configuration
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
    /// Write a default configuration file
    Init,
}
