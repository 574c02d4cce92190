use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use redlining_lib::DataError;
use serde_json::json;
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Search keyword is required")]
    MissingKeyword,

    #[error("Missing required parameters")]
    MissingParameters,

    #[error("Missing required userId parameter")]
    MissingUserId,

    #[error("Invalid value for parameter {0}")]
    InvalidParameter(&'static str),

    #[error("Invalid query string: {0}")]
    InvalidQuery(String),

    #[error("Data error: {0}")]
    Data(DataError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::EmptyKeyword => AppError::MissingKeyword,
            other => AppError::Data(other),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingKeyword
            | AppError::MissingParameters
            | AppError::MissingUserId
            | AppError::InvalidParameter(_)
            | AppError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            AppError::Data(_) | AppError::Storage(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// `{"result": "error", "message": ...}` with the given status
pub fn error_envelope(status: StatusCode, message: impl Into<String>) -> Response {
    let body = json!({
        "result": "error",
        "message": message.into(),
    });
    (status, Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        }

        error_envelope(status, self.to_string())
    }
}
