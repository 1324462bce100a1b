//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and configuration. Every option can also be set from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::constants::{
    DB_PATH, DEFAULT_DOWNLOAD_URL, LICENSE_KEY_PLACEHOLDER, LISTEN_ADDR, MAXMIND_LICENSE_KEY_ENV,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Service configuration.
///
/// Parsed from the command line with environment fallbacks, or constructed
/// programmatically.
///
/// # Examples
///
/// ```no_run
/// use geoip_service::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     db_path: PathBuf::from("/var/lib/geoip/geoip.db"),
///     license_key: Some("secret".to_string()),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Parser)]
#[command(name = "geoip_service", version, about = "GeoIP lookup service backed by MaxMind CSV data")]
pub struct Config {
    /// Database path (SQLite file)
    #[arg(long, env = "GEOIP_DB_PATH", default_value = DB_PATH)]
    pub db_path: PathBuf,

    /// Address the HTTP server listens on
    #[arg(long, env = "GEOIP_LISTEN", default_value = LISTEN_ADDR)]
    pub listen: SocketAddr,

    /// Archive download URL; every `@` is replaced by the licence key
    #[arg(long, env = "MAXMIND_DOWNLOAD_URL", default_value = DEFAULT_DOWNLOAD_URL)]
    pub download_url: String,

    /// MaxMind licence key
    #[arg(long, env = MAXMIND_LICENSE_KEY_ENV, hide_env_values = true)]
    pub license_key: Option<String>,

    /// Download and import the dataset right after startup
    #[arg(long)]
    pub update_on_start: bool,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl Config {
    /// Download URL with the licence key substituted, when one is set.
    pub fn resolved_download_url(&self) -> String {
        match &self.license_key {
            Some(key) => self
                .download_url
                .replace(LICENSE_KEY_PLACEHOLDER, key.as_str()),
            None => self.download_url.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DB_PATH),
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            license_key: None,
            update_on_start: false,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
        }
    }
}
