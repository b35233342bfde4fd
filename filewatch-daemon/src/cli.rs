//! CLI argument definitions for filewatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use filewatch_core::config::FilewatchConfig;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "filewatch.toml";

/// filewatch file access monitoring daemon.
///
/// Runs a trace producer, turns its output into file access events,
/// filters and de-duplicates them, and stores them in memory until shutdown.
#[derive(Parser, Debug, Default)]
#[command(name = "filewatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to filewatch.toml configuration file.
    ///
    /// When omitted, `filewatch.toml` in the working directory is used if present,
    /// otherwise built-in defaults.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only keep events whose path matches this wildcard pattern.
    #[arg(long)]
    pub include: Option<String>,

    /// Drop events whose path matches this wildcard pattern.
    #[arg(long)]
    pub exclude: Option<String>,

    /// Only keep events whose process name matches this wildcard pattern.
    #[arg(long)]
    pub process: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting a session.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut FilewatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(include) = &self.include {
            config.ingest.include_pattern = include.clone();
        }
        if let Some(exclude) = &self.exclude {
            config.ingest.exclude_pattern = exclude.clone();
        }
        if let Some(process) = &self.process {
            config.ingest.process_pattern = process.clone();
        }
    }
}
