//! Address lookup and locale listing handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;

use super::super::types::AppState;
use super::error_response;
use crate::error_handling::LookupError;

/// Location chain of the block covering `address`, in the given locale
pub async fn address_handler(
    State(state): State<AppState>,
    Path((address, locale_code)): Path<(String, String)>,
) -> Response {
    match state.store.find_address(&address, &locale_code).await {
        Ok(Some(found)) => (StatusCode::OK, Json(found)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("No block covers {}", address),
        ),
        Err(e @ LookupError::MalformedAddress(_)) => error_response(StatusCode::BAD_REQUEST, e),
        Err(e) => {
            error!("Lookup of {} failed: {}", address, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// Locale codes present in the dataset
pub async fn locales_handler(State(state): State<AppState>) -> Response {
    match state.store.list_locales().await {
        Ok(locales) => (StatusCode::OK, Json(locales)).into_response(),
        Err(e) => {
            error!("Listing locales failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}
