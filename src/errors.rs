use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::AppointmentStatus;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("requested time is not bookable: {0}")]
    InvalidSlot(String),

    #[error("that slot is already taken")]
    SlotConflict,

    #[error("cannot change status from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("the appointment has already started and can no longer be cancelled")]
    TooLateToCancel,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code, so callers can tell user-correctable
    /// errors apart from transient infrastructure failures.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidSlot(_) => "invalid_slot",
            AppError::SlotConflict => "slot_conflict",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::TooLateToCancel => "too_late_to_cancel",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Unavailable(_) => "unavailable",
            AppError::Database(_) | AppError::Internal(_) => "internal",
        }
    }

    /// Wrap an error coming out of the query layer, surfacing busy/locked
    /// conditions and unique-index violations as their domain meaning.
    pub fn storage(e: anyhow::Error) -> Self {
        match e.downcast::<rusqlite::Error>() {
            Ok(dbe) => dbe.into(),
            Err(other) => AppError::Internal(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(err, _) = &e {
            match err.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    return AppError::Unavailable("database busy".to_string());
                }
                rusqlite::ErrorCode::ConstraintViolation => {
                    // The only unique constraint on appointments is the
                    // (barber, date, start_time) slot index.
                    let msg = e.to_string();
                    if msg.contains("idx_appointments_slot") {
                        return AppError::SlotConflict;
                    }
                }
                _ => {}
            }
        }
        AppError::Database(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidSlot(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SlotConflict => StatusCode::CONFLICT,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::TooLateToCancel => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string(), "code": self.code() });
        (status, axum::Json(body)).into_response()
    }
}
