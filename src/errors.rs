use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};

/// Standard error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Unprocessable Entity")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Material is not rentable: {0}")]
    NotRentable(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Conflicting document: {0}")]
    ConflictingDocument(String),

    #[error("Exceeds planned quantity: {0}")]
    ExceedsPlanned(String),

    #[error("Exceeds delivered quantity: {0}")]
    ExceedsDelivered(String),

    #[error("Exceeds available quantity: {0}")]
    ExceedsAvailable(String),

    #[error("Ownership mismatch: {0}")]
    OwnershipMismatch(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::ConflictingDocument(_) => StatusCode::CONFLICT,
            Self::OwnershipMismatch(_) => StatusCode::NOT_FOUND,
            Self::InsufficientStock(_)
            | Self::NotRentable(_)
            | Self::InvalidTransition(_)
            | Self::ExceedsPlanned(_)
            | Self::ExceedsDelivered(_)
            | Self::ExceedsAvailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::insufficient_stock(ServiceError::InsufficientStock("m1".into()))]
    #[case::not_rentable(ServiceError::NotRentable("m1".into()))]
    #[case::invalid_transition(ServiceError::InvalidTransition("delivered".into()))]
    #[case::exceeds_planned(ServiceError::ExceedsPlanned("x".into()))]
    #[case::exceeds_delivered(ServiceError::ExceedsDelivered("x".into()))]
    #[case::exceeds_available(ServiceError::ExceedsAvailable("x".into()))]
    fn business_rule_violations_map_to_422(#[case] err: ServiceError) {
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn conflicting_document_maps_to_409() {
        let err = ServiceError::ConflictingDocument("DDT-2026-0001".into());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ServiceError::InternalError("secret pool state".into());
        assert_eq!(err.response_message(), "Internal server error");
    }
}
