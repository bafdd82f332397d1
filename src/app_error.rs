use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{services::MarketError, store::StoreError};

/// Standard JSON envelope every endpoint answers with. Success responses
/// carry `data`; failures carry only `message` with `success: false`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StdResponse<T, M> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T, M> IntoResponse for StdResponse<T, M>
where
    T: Serialize,
    M: Serialize,
{
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// HTTP-facing error. Handlers return `Result<impl IntoResponse, AppError>`
/// and rely on `From<MarketError>` for the taxonomy → status-code mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    ForbiddenResource(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            Self::ForbiddenResource(message) => (StatusCode::FORBIDDEN, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Conflict(message) => (StatusCode::CONFLICT, message),
            Self::Unprocessable(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            Self::Other(err) => {
                // Log the chain; the client gets no internals.
                tracing::error!("Unhandled error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_owned(),
                )
            }
        };

        let body = StdResponse::<(), String> {
            success: false,
            data: None,
            message: Some(message),
        };

        (status, Json(body)).into_response()
    }
}

impl From<MarketError> for AppError {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::Validation(message) => Self::BadRequest(message),
            MarketError::Forbidden(message) => Self::ForbiddenResource(message),
            e @ (MarketError::ItemNotFound
            | MarketError::OrderNotFound
            | MarketError::PaymentNotFound
            | MarketError::ReviewNotFound) => Self::NotFound(e.to_string()),
            e @ (MarketError::DuplicatePayment | MarketError::AlreadyReviewed) => {
                Self::Conflict(e.to_string())
            }
            e @ (MarketError::CartEmpty
            | MarketError::ProductUnavailable { .. }
            | MarketError::InsufficientStock { .. }
            | MarketError::InvalidVariant
            | MarketError::AmountExceedsTotal
            | MarketError::InvalidTransition { .. }
            | MarketError::PaymentNotPending
            | MarketError::NotEligible) => Self::Unprocessable(e.to_string()),
            MarketError::Store(store) => match store {
                StoreError::NotFound => Self::NotFound("Record not found".into()),
                StoreError::Duplicate => Self::Conflict("Duplicate record".into()),
                s @ StoreError::InsufficientStock { .. } => Self::Unprocessable(s.to_string()),
                StoreError::Backend(err) => Self::Other(err),
            },
        }
    }
}
