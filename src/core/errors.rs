// src/core/errors.rs

//! Defines the primary error type for the entire application.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the proxy.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    #[error("IO Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("no 'query' parameter supplied")]
    MissingQuery,

    #[error("Query parse failed")]
    ParseError(String),

    #[error("Query type not allowed")]
    QueryTypeNotAllowed,

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Queue is full")]
    QueueFull,

    #[error("backend responded with an error")]
    BackendError { status: u16, body: String },

    #[error("job timed out")]
    Timeout,

    #[error("job was cancelled")]
    Cancelled,

    #[error("HTTP client error: {0}")]
    HttpClientError(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ProxyError {
    fn from(e: std::io::Error) -> Self {
        ProxyError::Io(Arc::new(e))
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        ProxyError::HttpClientError(e.to_string())
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(e: serde_json::Error) -> Self {
        ProxyError::Internal(format!("JSON error: {e}"))
    }
}

/// Error body shape shared by every known-precondition failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ProxyError {
    /// Maps this error to the HTTP status prescribed by the error taxonomy.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MissingQuery | ProxyError::ParseError(_) | ProxyError::QueryTypeNotAllowed => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::QueueFull | ProxyError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::BackendError { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::Io(_)
            | ProxyError::HttpClientError(_)
            | ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let ProxyError::BackendError { body, .. } = &self {
            // Preserve the upstream body verbatim rather than re-wrapping it in JSON.
            return (status, body.clone()).into_response();
        }
        let data = match &self {
            ProxyError::ParseError(msg) => Some(serde_json::Value::String(msg.clone())),
            _ => None,
        };
        let body = ErrorBody {
            message: self.to_string(),
            data,
        };
        (status, Json(body)).into_response()
    }
}
