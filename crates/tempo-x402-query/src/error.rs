use actix_web::{http::StatusCode, HttpResponse, ResponseError};

use crate::db::DbError;

/// Errors that reach the HTTP layer.
///
/// Upstream database failures that are part of a route's normal contract
/// (a non-2xx status from ClickHouse) are shaped by the handlers themselves;
/// this type covers bad input and unexpected failures.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or malformed caller input
    #[error("{0}")]
    BadRequest(String),

    /// Database could not be reached or its response could not be read
    #[error(transparent)]
    Database(#[from] DbError),

    #[error("{0}")]
    Internal(String),
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Database(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            GatewayError::BadRequest(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": msg
            })),
            GatewayError::Database(e) => {
                tracing::error!(error = %e, "database call failed");
                internal_error(&e.to_string())
            }
            GatewayError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal_error(msg)
            }
        }
    }
}

/// Uniform 500 envelope. Only the failure's message is exposed.
pub fn internal_error(message: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": "Internal server error",
        "message": message
    }))
}
