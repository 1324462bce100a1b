//! HTTP client initialization.
//!
//! This module provides the client used to download dataset archives.

use reqwest::ClientBuilder;

use crate::config::{DOWNLOAD_CONNECT_TIMEOUT, DOWNLOAD_TIMEOUT, USER_AGENT};

/// Initializes the HTTP client used for archive downloads.
///
/// Creates a `reqwest::Client` configured with:
/// - A generous overall timeout, sized for a large archive
/// - A short connect timeout so an unreachable host fails fast
/// - Rustls TLS backend (no native TLS)
///
/// # Errors
///
/// Returns a `reqwest::Error` if client creation fails.
pub fn init_download_client() -> Result<reqwest::Client, reqwest::Error> {
    ClientBuilder::new()
        .timeout(DOWNLOAD_TIMEOUT)
        .connect_timeout(DOWNLOAD_CONNECT_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
}
