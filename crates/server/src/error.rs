use axum::{http::StatusCode, Json};
use pwyc_core::errors::{ApplicationError, InterfaceError};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct PwycError {
    pub error: String,
}

pub type HandlerError = (StatusCode, Json<PwycError>);

/// Maps a domain failure to its HTTP shape. Internal details are logged, never returned.
pub fn interface_error(error: ApplicationError, correlation_id: &str) -> HandlerError {
    match error.into_interface(correlation_id) {
        InterfaceError::BadRequest { message, correlation_id } => {
            warn!(
                event_name = "pwyc.http.bad_request",
                correlation_id = %correlation_id,
                reason = %message,
                "request rejected"
            );
            (StatusCode::BAD_REQUEST, Json(PwycError { error: message }))
        }
        internal @ InterfaceError::Internal { .. } => {
            error!(
                event_name = "pwyc.http.internal_error",
                correlation_id = %internal.correlation_id(),
                error = %internal,
                "request failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PwycError { error: internal.user_message().to_string() }),
            )
        }
    }
}
