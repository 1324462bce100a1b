//! HTTP handlers.

mod lookup;
mod update;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::types::ErrorResponse;

pub use lookup::{address_handler, locales_handler};
pub use update::{status_handler, update_handler, upload_handler};

fn error_response(status: StatusCode, message: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
