//! Common error types for the gateway
//!
//! Every failure raised by a component (auth gate, SSRF guard, image codec,
//! backend client, settings store) is an [`AppError`]. The only place it turns
//! into a wire response is [`IntoResponse`], which renders the error envelope.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Forbidden: {0}")]
    ForbiddenOperation(String),

    #[error("{detail}: {cause}")]
    InvalidResource { detail: String, cause: String },

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Remote API call failed: {cause}")]
    RemoteCallFailed {
        operation: &'static str,
        cause: String,
    },

    #[error("Configuration rejected: {0}")]
    ConfigurationRejected(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error envelope returned for every failing request
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub detail: String,
    pub body: String,
    pub errors: String,
}

/// Marker left on failed responses so the timing middleware can pick a log level
#[derive(Debug, Clone)]
pub struct FailureNote {
    pub kind: &'static str,
    pub expected: bool,
    pub message: String,
}

impl AppError {
    /// Wire-level kind name of the error
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "ConfigError",
            AppError::Io(_) => "IoError",
            AppError::Json(_) => "JsonError",
            AppError::AuthenticationFailed(_) => "AuthenticationFailed",
            AppError::ForbiddenOperation(_) => "ForbiddenOperation",
            AppError::InvalidResource { .. } => "InvalidResource",
            AppError::UnsupportedFormat(_) => "UnsupportedFormat",
            AppError::RemoteCallFailed { .. } => "RemoteCallFailed",
            AppError::ConfigurationRejected(_) => "ConfigurationRejected",
            AppError::InvalidRequest(_) => "InvalidRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::MethodNotAllowed(_) => "MethodNotAllowed",
            AppError::Internal(_) => "UnexpectedDefect",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            AppError::RemoteCallFailed { .. } => StatusCode::BAD_GATEWAY,
            AppError::ConfigurationRejected(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidRequest(_) | AppError::Json(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short human readable message, without the underlying cause
    pub fn detail(&self) -> String {
        match self {
            AppError::AuthenticationFailed(msg)
            | AppError::ForbiddenOperation(msg)
            | AppError::ConfigurationRejected(msg)
            | AppError::InvalidRequest(msg)
            | AppError::NotFound(msg)
            | AppError::MethodNotAllowed(msg) => msg.clone(),
            AppError::InvalidResource { detail, .. } => detail.clone(),
            AppError::UnsupportedFormat(_) => "Invalid image format".to_string(),
            AppError::RemoteCallFailed { operation, .. } => {
                format!("Remote {} call failed", operation)
            }
            other => other.to_string(),
        }
    }

    /// Errors raised on purpose by request handling, as opposed to defects
    pub fn is_expected(&self) -> bool {
        !matches!(
            self,
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_)
        )
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.kind().to_string(),
            detail: self.detail(),
            body: String::new(),
            errors: self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let note = FailureNote {
            kind: self.kind(),
            expected: self.is_expected(),
            message: format!("{:?}", self),
        };

        let mut response = (status, Json(self.envelope())).into_response();
        if matches!(self, AppError::AuthenticationFailed(_)) {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
        }
        response.extensions_mut().insert(note);
        response
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
