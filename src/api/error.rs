use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::processor::ProcessError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Setup failed: {0}")]
    Setup(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Process(e) => {
                let detail = std::error::Error::source(&e)
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                tracing::error!("{} ({})", e, detail);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Setup(msg) => {
                tracing::error!("Setup error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", msg))
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
