//! CLI argument definitions for vigil-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Vigil log monitoring daemon.
///
/// Tails a log file, classifies lines against a regex parser chain,
/// bundles error contexts into incidents, and dispatches them to a
/// diagnosis backend.
#[derive(Parser, Debug)]
#[command(name = "vigil-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to vigil.toml configuration file.
    #[arg(short, long, default_value = "/etc/vigil/vigil.toml")]
    pub config: PathBuf,

    /// Override the monitored log file (takes precedence over config file).
    #[arg(short = 'f', long)]
    pub log_file: Option<String>,

    /// Override the parser definition file (takes precedence over config file).
    #[arg(short, long)]
    pub parsers: Option<String>,

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

    /// Read the whole file once and exit instead of tailing it.
    #[arg(long)]
    pub no_follow: bool,

    /// Validate configuration and parser definitions, then exit.
    #[arg(long)]
    pub validate: bool,
}
