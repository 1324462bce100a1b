//! geoip_service library: IP geolocation backed by MaxMind GeoLite2 CSV data
//!
//! This library imports MaxMind GeoLite2 City CSV archives into SQLite and
//! answers "which locations contain this address" queries. Address ranges are
//! stored as fixed-width byte keys, locations as a per-locale forest, and a
//! dataset update replaces everything in one transaction, so readers always
//! see either the previous or the new dataset.
//!
//! # Example
//!
//! ```no_run
//! use geoip_service::storage::{init_db_pool_with_path, run_migrations};
//! use geoip_service::GeoIpStore;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = init_db_pool_with_path(std::path::Path::new("./geoip.db")).await?;
//! run_migrations(&pool).await?;
//! let store = GeoIpStore::new(pool);
//!
//! if let Some(found) = store.find_address("203.0.113.7", "en").await? {
//!     for location in &found.locations {
//!         println!("{} {:?}", location.level, location.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

#![warn(missing_docs)]

pub mod config;
mod error_handling;
pub mod geoip;
pub mod initialization;
pub mod maxmind;
pub mod server;
pub mod storage;
pub mod tabular;
pub mod update;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use error_handling::{
    CodecError, DatabaseError, FailureCategory, ImportStats, InitializationError, LookupError,
    RowDefect, UpdateError,
};
pub use geoip::{AddressMatch, LocationLevel, LocationSummary, UpdateStatus};
pub use run::run_service;
pub use storage::GeoIpStore;
pub use update::{LaunchOutcome, UpdateConfig, UpdateService};

// Internal run module (wires the service together)
mod run {
    use anyhow::{Context, Result};
    use log::{info, warn};

    use crate::config::Config;
    use crate::server::{serve, AppState};
    use crate::storage::{init_db_pool_with_path, run_migrations, GeoIpStore};
    use crate::update::{LaunchOutcome, UpdateConfig, UpdateService};

    /// Runs the service until Ctrl-C.
    ///
    /// Opens (or creates) the database, applies migrations, optionally
    /// launches an update, then serves the HTTP API. On Ctrl-C the server
    /// stops accepting requests and a running update is cancelled and rolled
    /// back before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated, the
    /// listen address cannot be bound, or the server fails.
    pub async fn run_service(config: Config) -> Result<()> {
        let pool = init_db_pool_with_path(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        let store = GeoIpStore::new(pool);
        let updates = UpdateService::new(store.clone(), UpdateConfig::from(&config))
            .context("Failed to initialize update service")?;

        match store.find_last_update_time().await? {
            Some(updated_at) => info!("Serving dataset from {}", updated_at.to_rfc3339()),
            None => warn!("Database holds no dataset yet; POST /geoip/update to import one"),
        }

        if config.update_on_start && updates.launch_update() == LaunchOutcome::Started {
            info!("Initial update launched");
        }

        let listener = tokio::net::TcpListener::bind(config.listen)
            .await
            .with_context(|| format!("Failed to bind server to {}", config.listen))?;

        let state = AppState {
            store,
            updates: updates.clone(),
        };
        let served = serve(listener, state, shutdown_signal()).await;

        updates.shutdown().await;
        info!("Shutdown complete");
        served
    }

    async fn shutdown_signal() {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(e) => {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await
            }
        }
    }
}
