//! Single-flight bookkeeping for dataset updates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::warn;
use tokio::task::JoinHandle;

/// Tracks whether an update is in flight and the task running it.
///
/// The flag is the only admission check; the task handle is kept so that
/// shutdown can wait for a running update to roll back.
#[derive(Debug, Default)]
pub(super) struct UpdateState {
    updating: AtomicBool,
    running: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateState {
    /// Flips the flag from idle to updating. Returns `false` if an update is
    /// already in flight.
    pub(super) fn try_begin(&self) -> bool {
        self.updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(super) fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    /// Gives access to the running task slot. Lock it before spawning so the
    /// task cannot finish and clear the slot before its handle is stored.
    pub(super) fn running(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears the task slot, then the flag, so a new run admitted right after
    /// cannot lose its handle to the previous run's cleanup.
    fn finish(&self) {
        self.running().take();
        if self
            .updating
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Update finished while no update was recorded as running");
        }
    }
}

/// Resets [`UpdateState`] when the update task ends, whether it returned,
/// was aborted or panicked.
pub(super) struct RunGuard(pub(super) Arc<UpdateState>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}
