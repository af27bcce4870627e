use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{
        AbortError, ApplyError, PlanError, roster::RosterError, session::SessionError,
        settlement::SettlementError,
    },
};

/// Failures of the service layer, independent of HTTP.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The score store failed or refused the call.
    #[error("score store unavailable: {0}")]
    Unavailable(#[source] StorageError),
    /// No score store is installed yet.
    #[error("score store unavailable (degraded mode)")]
    Degraded,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The request does not fit the slot's current phase or data.
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// The score store did not answer in time.
    #[error("score store did not answer in time")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

/// Errors rendered as `{"message": ...}` with the matching status code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    ServiceUnavailable(String),
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {err}"))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            unavailable @ (ServiceError::Unavailable(_)
            | ServiceError::Degraded
            | ServiceError::Timeout) => AppError::ServiceUnavailable(unavailable.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = Json(ErrorBody {
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::InvalidState("another change to this slot is still being saved".into())
            }
            PlanError::InvalidTransition(invalid) => ServiceError::InvalidState(invalid.to_string()),
        }
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        let detail = match err {
            ApplyError::NoPending | ApplyError::IdMismatch { .. } => {
                "the saved change is no longer pending".to_string()
            }
            ApplyError::PhaseMismatch { expected, actual } => {
                format!("slot moved from {expected:?} to {actual:?} while saving")
            }
            ApplyError::VersionMismatch { expected, actual } => {
                format!("slot was modified while saving (version {expected} -> {actual})")
            }
        };
        ServiceError::InvalidState(detail)
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        match err {
            AbortError::NoPending | AbortError::IdMismatch { .. } => {
                ServiceError::InvalidState("no matching change to roll back".into())
            }
        }
    }
}

impl From<SettlementError> for ServiceError {
    fn from(err: SettlementError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<RosterError> for ServiceError {
    fn from(err: RosterError) -> Self {
        match err {
            RosterError::InUse(_) => ServiceError::InvalidState(err.to_string()),
            RosterError::EmptyName | RosterError::Duplicate(_) => {
                ServiceError::InvalidInput(err.to_string())
            }
        }
    }
}
