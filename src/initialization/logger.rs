//! Logger initialization.
//!
//! Log lines come either as colored text for a terminal or as one JSON
//! object per line for collectors. The `--log-level` value sets the level;
//! `RUST_LOG` adds filters for any other module.

use std::io::Write;

use chrono::{SecondsFormat, Utc};
use colored::*;
use log::{Level, LevelFilter, Record};
use serde_json::json;

use crate::config::LogFormat;
use crate::error_handling::InitializationError;

/// Dependencies that log every query or connection at `debug`.
const CHATTY_DEPENDENCIES: [(&str, LevelFilter); 4] = [
    ("sqlx", LevelFilter::Warn),
    ("reqwest", LevelFilter::Info),
    ("hyper", LevelFilter::Info),
    ("hyper_util", LevelFilter::Info),
];

const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Installs the global logger.
///
/// `level` applies to this crate and becomes the default for everything
/// else; the dependencies that flood the log at `debug` (SQL statements,
/// connection pool chatter) are capped regardless. Module filters from
/// `RUST_LOG` are read first and kept for every module not set here.
///
/// # Errors
///
/// Returns `InitializationError::LoggerError` if a logger is already
/// installed.
///
/// # Examples
///
/// ```bash
/// # Trace the import, keep dependencies quiet
/// geoip_service --log-level debug
///
/// # Also hear from the zip reader
/// RUST_LOG=zip=debug geoip_service --log-level debug
/// ```
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> Result<(), InitializationError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level);
    for (module, cap) in CHATTY_DEPENDENCIES {
        builder.filter_module(module, cap.min(level));
    }
    builder.filter_module(CRATE_TARGET, level);

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| writeln!(buf, "{}", json_line(record)));
        }
        LogFormat::Plain => {
            colored::control::set_override(true);
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{} {:>5} {} {}",
                    Utc::now().format("%H:%M:%S%.3f").to_string().dimmed(),
                    colored_level(record.level()),
                    short_target(record.target()).cyan(),
                    record.args()
                )
            });
        }
    }

    builder.try_init().map_err(InitializationError::from)
}

/// Renders one record as a single-line JSON object.
fn json_line(record: &Record<'_>) -> String {
    json!({
        "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "level": record.level().as_str(),
        "target": record.target(),
        "msg": record.args().to_string(),
    })
    .to_string()
}

fn colored_level(level: Level) -> ColoredString {
    let label = level.as_str();
    match level {
        Level::Error => label.red().bold(),
        Level::Warn => label.yellow(),
        Level::Info => label.green(),
        Level::Debug => label.blue(),
        Level::Trace => label.purple(),
    }
}

/// Drops the crate name from this crate's own targets.
fn short_target(target: &str) -> &str {
    target
        .strip_prefix(CRATE_TARGET)
        .and_then(|rest| rest.strip_prefix("::"))
        .unwrap_or(target)
}
