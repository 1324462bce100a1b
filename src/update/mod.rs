//! Dataset update orchestration.
//!
//! At most one update runs at a time. A launch either starts a run on its
//! own task and returns immediately, or reports that one is already in
//! flight; it never waits for the run to finish. A run that fails or is
//! cancelled rolls back, leaving the previous dataset in place.

mod download;
mod pipeline;
mod state;

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::config::{
    Config, DEFAULT_DOWNLOAD_URL, DOWNLOAD_BACKOFF_BASE_SECS, DOWNLOAD_MAX_ATTEMPTS,
    LICENSE_KEY_PLACEHOLDER, MAX_ARCHIVE_SIZE,
};
use crate::error_handling::{DatabaseError, FailureCategory, InitializationError, UpdateError};
use crate::geoip::UpdateStatus;
use crate::initialization::init_download_client;
use crate::storage::GeoIpStore;

use pipeline::{run_update, ArchiveSource};
use state::{RunGuard, UpdateState};

pub use pipeline::ImportSummary;

/// Settings of the update pipeline.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// Archive URL, licence key already substituted.
    pub download_url: String,
    /// Largest archive accepted, downloaded or uploaded.
    pub max_archive_size: u64,
    /// Download attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for every further one.
    pub retry_backoff: Duration,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            max_archive_size: MAX_ARCHIVE_SIZE,
            max_attempts: DOWNLOAD_MAX_ATTEMPTS,
            retry_backoff: Duration::from_secs(DOWNLOAD_BACKOFF_BASE_SECS),
        }
    }
}

impl From<&Config> for UpdateConfig {
    fn from(config: &Config) -> Self {
        Self {
            download_url: config.resolved_download_url(),
            ..Self::default()
        }
    }
}

/// Result of asking for an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum LaunchOutcome {
    /// A new run was started.
    Started,
    /// Another run is in flight; nothing was started.
    AlreadyRunning,
    /// The service is shutting down; nothing was started.
    ShuttingDown,
}

/// Launches dataset updates, one at a time.
///
/// Cheap to clone; clones share the same single-flight state.
#[derive(Clone)]
pub struct UpdateService {
    inner: Arc<Inner>,
}

struct Inner {
    store: GeoIpStore,
    client: reqwest::Client,
    config: UpdateConfig,
    state: Arc<UpdateState>,
    shutdown: CancellationToken,
}

impl UpdateService {
    /// Creates the service and its download client.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError::HttpClientError` if the client cannot be
    /// built.
    pub fn new(store: GeoIpStore, config: UpdateConfig) -> Result<Self, InitializationError> {
        if config.download_url.contains(LICENSE_KEY_PLACEHOLDER) {
            warn!("Download URL still holds the licence key placeholder; downloads will likely be rejected");
        }
        let client = init_download_client()?;
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                client,
                config,
                state: Arc::new(UpdateState::default()),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// Starts an update from the configured download URL, unless one is
    /// already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn launch_update(&self) -> LaunchOutcome {
        self.launch(|| ArchiveSource::Download(self.inner.config.download_url.clone()))
    }

    /// Starts an update from an uploaded archive, unless one is already
    /// running. The reader is dropped unread when nothing is started.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn launch_update_from<R>(&self, reader: R) -> LaunchOutcome
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.launch(move || ArchiveSource::Upload(Box::new(reader)))
    }

    /// Whether an update is in flight.
    pub fn is_updating(&self) -> bool {
        self.inner.state.is_updating()
    }

    /// Time of the last committed update plus whether one is in flight.
    pub async fn status(&self) -> Result<UpdateStatus, DatabaseError> {
        let updated_at = self.inner.store.find_last_update_time().await?;
        Ok(UpdateStatus {
            updated_at,
            updating: self.is_updating(),
        })
    }

    /// Cancels a running update and waits for it to roll back. Later
    /// launches are refused.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let running = self.inner.state.running().take();
        if let Some(handle) = running {
            info!("Waiting for the running update to stop");
            if let Err(e) = handle.await {
                warn!("Update task ended abnormally: {}", e);
            }
        }
    }

    fn launch(&self, source: impl FnOnce() -> ArchiveSource) -> LaunchOutcome {
        if self.inner.shutdown.is_cancelled() {
            info!("Update not started: shutting down");
            return LaunchOutcome::ShuttingDown;
        }
        if !self.inner.state.try_begin() {
            info!("Update already running");
            return LaunchOutcome::AlreadyRunning;
        }

        let source = source();
        let inner = self.inner.clone();
        let guard = RunGuard(inner.state.clone());
        let cancel = inner.shutdown.child_token();

        let mut running = self.inner.state.running();
        *running = Some(tokio::spawn(async move {
            let _guard = guard;
            info!("Update started");
            let result = run_update(
                &inner.store,
                &inner.client,
                &inner.config,
                source,
                cancel,
            )
            .await;
            log_outcome(result);
        }));
        LaunchOutcome::Started
    }
}

fn log_outcome(result: Result<ImportSummary, UpdateError>) {
    match result {
        Ok(summary) => info!(
            "Update committed: {} locales, {} timezones, {} locations, {} blocks",
            summary.locales, summary.timezones, summary.locations, summary.blocks
        ),
        Err(e) => match e.category() {
            FailureCategory::Cancelled => {
                warn!("Update cancelled, previous dataset kept")
            }
            category => error!(
                "Update failed ({}), previous dataset kept: {}",
                category.as_str(),
                e
            ),
        },
    }
}
