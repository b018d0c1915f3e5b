use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wallet_engine::{ErrorKind, WalletError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("{0}")]
    WalletError(#[from] WalletError),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("Could not read query parameters: {0}")]
    InvalidQuery(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

/// The body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub kind: String,
}

const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred. Please try again later.";

impl ServerError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WalletError(e) => match e.kind() {
                ErrorKind::Validation => "validation",
                ErrorKind::NotFound => "not_found",
                ErrorKind::Conflict => "conflict",
                ErrorKind::Transient | ErrorKind::Internal => "internal",
            },
            Self::InvalidRequestBody(_) | Self::InvalidRequestPath(_) | Self::InvalidQuery(_) => "validation",
            Self::NoRecordFound(_) => "not_found",
            Self::InitializeError(_) | Self::IOError(_) | Self::Unspecified(_) => "internal",
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::WalletError(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                // Lock contention that outlived the retries is reported like any other store failure
                ErrorKind::Transient | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("💻️ Request failed with an internal error. {self}");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            debug!("💻️ Request rejected. {self}");
            self.to_string()
        };
        let body = ErrorResponse { success: false, message, kind: self.kind().to_string() };
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::to_string(&body).unwrap_or_default())
    }
}
