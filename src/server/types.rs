//! HTTP server data structures.

use serde::Serialize;

use crate::storage::GeoIpStore;
use crate::update::{LaunchOutcome, UpdateService};

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: GeoIpStore,
    pub updates: UpdateService,
}

/// JSON response for the update endpoints
#[derive(Serialize)]
pub struct LaunchResponse {
    pub status: &'static str,
}

impl From<LaunchOutcome> for LaunchResponse {
    fn from(outcome: LaunchOutcome) -> Self {
        LaunchResponse {
            status: outcome.into(),
        }
    }
}

/// JSON body of every error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
