//! Archive download with retries and size limits.

use std::path::Path;

use log::{info, warn};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::error_handling::UpdateError;

use super::UpdateConfig;

/// Downloads the archive at `url` into `dest`, returning its size in bytes.
///
/// Transient failures are retried with exponential backoff (base, 2x base,
/// ...). Each attempt truncates `dest` first. Oversized archives, client
/// errors and cancellation are not retried.
pub(crate) async fn download_archive(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    config: &UpdateConfig,
    cancel: &CancellationToken,
) -> Result<u64, UpdateError> {
    info!("Downloading archive from: {}", redact_query(url));

    let mut attempt = 1;
    loop {
        match download_once(client, url, dest, config.max_archive_size, cancel).await {
            Ok(size) => {
                info!("Downloaded {} bytes", size);
                return Ok(size);
            }
            Err(e) if attempt >= config.max_attempts || !is_transient(&e) => return Err(e),
            Err(e) => {
                warn!(
                    "Failed to download archive (attempt {}/{}): {}, retrying...",
                    attempt, config.max_attempts, e
                );
                let delay = config.retry_backoff * (1 << (attempt - 1));
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
                }
                attempt += 1;
            }
        }
    }
}

async fn download_once(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    limit: u64,
    cancel: &CancellationToken,
) -> Result<u64, UpdateError> {
    let mut response = tokio::select! {
        response = client.get(url).send() => response?.error_for_status()?,
        _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
    };

    // Check content-length header if available
    if let Some(content_length) = response.content_length() {
        if content_length > limit {
            return Err(UpdateError::ArchiveTooLarge {
                size: content_length,
                limit,
            });
        }
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut written: u64 = 0;
    loop {
        let chunk = tokio::select! {
            chunk = response.chunk() => chunk?,
            _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
        };
        let Some(chunk) = chunk else { break };
        // content-length may be missing or wrong
        written += chunk.len() as u64;
        if written > limit {
            return Err(UpdateError::ArchiveTooLarge {
                size: written,
                limit,
            });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(written)
}

/// Server errors, timeouts and local I/O hiccups are worth another try; a
/// 4xx (bad licence key, wrong edition) is not.
fn is_transient(error: &UpdateError) -> bool {
    match error {
        UpdateError::Download(e) => match e.status() {
            Some(status) => {
                status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            None => true,
        },
        UpdateError::Io(_) => true,
        _ => false,
    }
}

/// Strips the query string, which carries the licence key.
pub(crate) fn redact_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Backoff used by tests so retries do not sleep for seconds.
#[cfg(test)]
pub(crate) const TEST_BACKOFF: std::time::Duration = std::time::Duration::from_millis(10);
