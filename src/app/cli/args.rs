//! Command line arguments
//!
//! Values given here override the same settings from the configuration file.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "telebus")]
#[command(about = "Telemetry node message bus")]
#[command(version)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Force colored log output
    #[arg(long = "color")]
    pub color: bool,

    /// Disable colored log output
    #[arg(long = "no-color", conflicts_with = "color")]
    pub no_color: bool,

    /// Upper bound of each worker's wait for new data, in milliseconds
    #[arg(long = "wait-timeout-ms", value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub wait_timeout_ms: Option<u64>,

    /// Stop the node after this many seconds instead of waiting for a signal
    #[arg(long = "run-for-secs", value_name = "SECONDS")]
    pub run_for_secs: Option<u64>,
}

impl Args {
    pub fn parse_from_env() -> Self {
        Self::parse()
    }

    /// Explicit color choice: `Some(true)` for --color, `Some(false)` for
    /// --no-color, `None` to follow the terminal
    pub fn color_choice(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }

    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_secs.map(Duration::from_secs)
    }
}
