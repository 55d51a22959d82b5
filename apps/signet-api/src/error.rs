//! Error types for the signet API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use signet_core::SignError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Sign(#[from] SignError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("missing or invalid bearer token")]
    Unauthenticated,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn status_for_kind(kind: &str) -> StatusCode {
    match kind {
        "validation" | "invalid_number" | "invalid_page" | "out_of_bounds"
        | "no_pending_signatures" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "not_authorized" => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message, details) = match &self {
            ApiError::Sign(e) => {
                let status = status_for_kind(e.kind());
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("signing error: {}", e);
                }
                (status, e.kind(), e.to_string(), e.details())
            }
            ApiError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "validation", msg.clone(), None)
            }
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "not_authorized",
                self.to_string(),
                None,
            ),
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "not_authorized",
                self.to_string(),
                None,
            ),
            ApiError::Database(e) => {
                tracing::error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage",
                    "database error".to_string(),
                    None,
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal error".to_string(),
                    None,
                )
            }
        };

        let mut error = json!({
            "kind": kind,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }
        let body = Json(json!({
            "error": error,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
