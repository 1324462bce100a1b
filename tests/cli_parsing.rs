//! Tests for CLI and environment parsing of `Config`.

use clap::Parser;
use geoip_service::config::{LogFormat, LogLevel, MAXMIND_LICENSE_KEY_ENV};
use geoip_service::Config;
use std::path::PathBuf;

#[test]
fn test_cli_options_override_defaults() {
    let args = [
        "geoip_service",
        "--db-path",
        "/var/lib/geoip/geoip.db",
        "--download-url",
        "https://mirror.example/GeoLite2-City-CSV.zip?key=@",
        "--license-key",
        "k3y",
        "--log-level",
        "debug",
        "--log-format",
        "json",
    ];
    let config = Config::try_parse_from(args.iter()).expect("Should parse options");

    assert_eq!(config.db_path, PathBuf::from("/var/lib/geoip/geoip.db"));
    assert_eq!(
        config.resolved_download_url(),
        "https://mirror.example/GeoLite2-City-CSV.zip?key=k3y"
    );
    // LogLevel and LogFormat don't implement PartialEq, so we compare via conversion
    assert_eq!(
        log::LevelFilter::from(config.log_level.clone()),
        log::LevelFilter::from(LogLevel::Debug)
    );
    match config.log_format {
        LogFormat::Json => {}
        _ => panic!("Should be Json format"),
    }
}

#[test]
fn test_cli_rejects_invalid_values() {
    let bad_level = Config::try_parse_from(["geoip_service", "--log-level", "verbose"]);
    assert!(bad_level.is_err());

    let bad_listen = Config::try_parse_from(["geoip_service", "--listen", "not-an-address"]);
    assert!(bad_listen.is_err());
}

#[test]
fn test_environment_fallback() {
    // Only this test touches these variables.
    std::env::set_var(MAXMIND_LICENSE_KEY_ENV, "from-env");
    std::env::set_var("GEOIP_LISTEN", "127.0.0.1:9191");

    let config = Config::try_parse_from(["geoip_service"]).expect("Should parse from env");

    std::env::remove_var(MAXMIND_LICENSE_KEY_ENV);
    std::env::remove_var("GEOIP_LISTEN");

    assert_eq!(config.license_key.as_deref(), Some("from-env"));
    assert_eq!(config.listen.port(), 9191);
    assert!(config.resolved_download_url().contains("license_key=from-env"));
}
