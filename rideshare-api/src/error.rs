use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use rideshare_core::BookingError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    Booking(BookingError),
    Anyhow(anyhow::Error),
}

impl AppError {
    fn status(error: &BookingError) -> StatusCode {
        match error {
            BookingError::RideNotFound | BookingError::NotificationNotFound => StatusCode::NOT_FOUND,
            BookingError::AlreadyJoined
            | BookingError::NotJoined
            | BookingError::SoldOut
            | BookingError::InvalidState { .. } => StatusCode::CONFLICT,
            BookingError::NotAuthorized => StatusCode::FORBIDDEN,
            BookingError::NoteRequired | BookingError::InvalidRide(_) => StatusCode::BAD_REQUEST,
            BookingError::TransientConflict { .. } => StatusCode::SERVICE_UNAVAILABLE,
            BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg, "unauthenticated"),
            AppError::Booking(BookingError::Store(err)) => {
                tracing::error!("Storage failure: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    "internal",
                )
            }
            AppError::Booking(err) => (Self::status(&err), err.to_string(), err.code()),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    "internal",
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        match err.into().downcast::<BookingError>() {
            Ok(booking) => Self::Booking(booking),
            Err(other) => Self::Anyhow(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_errors_keep_their_status() {
        let err: AppError = BookingError::SoldOut.into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);

        let err: AppError = BookingError::TransientConflict { attempts: 5 }.into();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
