//! HTTP API over the dataset and the update service.
//!
//! Provides five endpoints under `/geoip`:
//! - `GET /geoip/address/:address/:locale` - location chain of an address
//! - `GET /geoip/locales` - locale codes present in the dataset
//! - `POST /geoip/update` - launch an update from the download URL
//! - `POST /geoip/update/file` - launch an update from an uploaded archive
//! - `GET /geoip/status` - last update time and whether one is running

mod handlers;
mod types;

use std::future::Future;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::config::MAX_ARCHIVE_SIZE;
use handlers::{
    address_handler, locales_handler, status_handler, update_handler, upload_handler,
};
pub use types::AppState;

/// Builds the router with all `/geoip` routes
pub fn router(state: AppState) -> Router {
    let upload_limit = usize::try_from(MAX_ARCHIVE_SIZE).unwrap_or(usize::MAX);
    Router::new()
        .route("/geoip/address/:address/:locale", get(address_handler))
        .route("/geoip/locales", get(locales_handler))
        .route("/geoip/update", post(update_handler))
        .route(
            "/geoip/update/file",
            post(upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/geoip/status", get(status_handler))
        .with_state(state)
}

/// Serves the API on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .context("Failed to read server listen address")?;
    log::info!("GeoIP server listening on http://{}/", addr);
    log::info!("  - Lookup: http://{}/geoip/address/<address>/<locale>", addr);
    log::info!("  - Status: http://{}/geoip/status", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("GeoIP server error")?;

    Ok(())
}
