// src/api/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::error::SentinelError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Frame could not be decoded or is malformed (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Predictor training or a worker task failed (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<SentinelError> for ApiError {
    fn from(err: SentinelError) -> Self {
        match err {
            SentinelError::Decode(_) | SentinelError::InvalidFrame(_) => {
                Self::BadRequest(err.to_string())
            }
            SentinelError::Training(_) | SentinelError::Config(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("worker task: {err}"))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "API error"),
            Self::BadRequest(_) => tracing::warn!(error = %self, "API error"),
        }
        let body = ErrorResponse {
            code: self.error_code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
