//! services/wizard/src/web/error.rs
//!
//! The error type returned by the reference backend's handlers. Pipeline
//! errors keep their wire code so the REST client can rebuild them.

use crate::web::protocol::{error_code, ErrorBody, ErrorDetail, INTERNAL_ERROR, VALIDATION_ERROR};
use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use skilllens_core::ports::PortError;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Port(#[from] PortError),

    /// A malformed request that never reached the pipeline.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An extractor refused the request; keeps axum's status.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

macro_rules! from_rejection {
    ($($rejection:ty),+ $(,)?) => {$(
        impl From<$rejection> for ApiError {
            fn from(rejection: $rejection) -> Self {
                ApiError::Rejected {
                    status: rejection.status(),
                    message: rejection.body_text(),
                }
            }
        }
    )+};
}

from_rejection!(
    JsonRejection,
    PathRejection,
    QueryRejection,
    MultipartRejection,
    MultipartError,
);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Port(err) => match err {
                PortError::Validation(_) => StatusCode::BAD_REQUEST,
                PortError::Storage(_) => StatusCode::INSUFFICIENT_STORAGE,
                PortError::NotFound(_) => StatusCode::NOT_FOUND,
                PortError::Conflict(_) => StatusCode::CONFLICT,
                PortError::NotReady(_) => too_early(),
                PortError::Network(_) | PortError::Timeout(_) | PortError::Unexpected(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

/// The bare message, so the client does not prefix it twice.
fn detail(err: &PortError) -> String {
    match err {
        PortError::Validation(m)
        | PortError::Storage(m)
        | PortError::Network(m)
        | PortError::NotFound(m)
        | PortError::Conflict(m)
        | PortError::NotReady(m)
        | PortError::Unexpected(m) => m.clone(),
        PortError::Timeout(_) => err.to_string(),
    }
}

/// 425 Too Early: the batch has not finished yet.
fn too_early() -> StatusCode {
    StatusCode::from_u16(425).unwrap_or(StatusCode::CONFLICT)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match &self {
            ApiError::BadRequest(msg) => (VALIDATION_ERROR, msg.clone()),
            ApiError::Rejected { status, message } if status.is_server_error() => {
                (INTERNAL_ERROR, message.clone())
            }
            ApiError::Rejected { message, .. } => (VALIDATION_ERROR, message.clone()),
            ApiError::Port(err) => (error_code(err), detail(err)),
        };
        if code == INTERNAL_ERROR {
            error!("Request failed: {}", message);
        }

        let body = Json(ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        });
        (status, body).into_response()
    }
}
