//! Update launch and status handlers.

use std::io::SeekFrom;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::{error, info};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use super::super::types::{AppState, LaunchResponse};
use super::error_response;
use crate::update::LaunchOutcome;

/// Multipart field holding the uploaded archive
const UPLOAD_FIELD: &str = "file";

/// Launches an update from the configured download URL
pub async fn update_handler(State(state): State<AppState>) -> Response {
    launch_response(state.updates.launch_update())
}

/// Launches an update from an archive uploaded as multipart field `file`
///
/// The field is spooled to an anonymous temporary file first, so the upload
/// is never held in memory.
pub async fn upload_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    if state.updates.is_updating() {
        return launch_response(LaunchOutcome::AlreadyRunning);
    }

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let mut spool = match tempfile::tempfile() {
            Ok(file) => tokio::fs::File::from_std(file),
            Err(e) => {
                error!("Failed to create upload spool file: {}", e);
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, e);
            }
        };
        let mut received: u64 = 0;
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    received += chunk.len() as u64;
                    if let Err(e) = spool.write_all(&chunk).await {
                        error!("Failed to spool upload: {}", e);
                        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e);
                    }
                }
                Ok(None) => break,
                Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
            }
        }
        if let Err(e) = rewind(&mut spool).await {
            error!("Failed to rewind upload spool file: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e);
        }

        info!("Received archive upload of {} bytes", received);
        return launch_response(state.updates.launch_update_from(spool));
    }

    error_response(
        StatusCode::BAD_REQUEST,
        format!("Missing multipart field '{}'", UPLOAD_FIELD),
    )
}

/// Last update time and whether an update is running
pub async fn status_handler(State(state): State<AppState>) -> Response {
    match state.updates.status().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => {
            error!("Reading update status failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

async fn rewind(file: &mut tokio::fs::File) -> std::io::Result<()> {
    file.flush().await?;
    file.seek(SeekFrom::Start(0)).await?;
    Ok(())
}

fn launch_response(outcome: LaunchOutcome) -> Response {
    let status = match outcome {
        LaunchOutcome::Started | LaunchOutcome::AlreadyRunning => StatusCode::ACCEPTED,
        LaunchOutcome::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(LaunchResponse::from(outcome))).into_response()
}
