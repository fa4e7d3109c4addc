use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use barline_core::errors::{Error as CoreError, ErrorKind};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("{0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(e) => match e {
                CoreError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
                CoreError::InvalidRange { .. } | CoreError::Validation(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => match e.kind() {
                    ErrorKind::Transport | ErrorKind::Api => StatusCode::BAD_GATEWAY,
                    ErrorKind::Storage | ErrorKind::Other => StatusCode::INTERNAL_SERVER_ERROR,
                },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("API request failed: {}", self);
        }
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
