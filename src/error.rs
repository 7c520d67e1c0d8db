// src/error.rs

use crate::lookup::ExhaustionReport;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Structured error response body.
#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Serialize, Debug)]
struct ErrorDetails {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Application-level errors.
///
/// Implements `IntoResponse` so handlers can bubble errors straight to the
/// client as standardized JSON bodies.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlParsing(#[from] serde_yaml::Error),

    #[error("HTTP client build error: {0}")]
    HttpClientBuild(#[source] reqwest::Error),

    #[error("GSTIN must not be empty")]
    MissingGstin,

    #[error("{0}")]
    AllKeysExhausted(#[from] ExhaustionReport),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Maps the error to a status code and client-facing details. Internal
    /// causes are logged here and not leaked to the client.
    fn to_status_and_details(&self) -> (StatusCode, ErrorDetails) {
        match self {
            Self::Config(msg) => {
                error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "CONFIG_ERROR".to_string(),
                        message: "Internal server configuration error".to_string(),
                        details: None,
                    },
                )
            }
            Self::Io(e) => {
                error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "IO_ERROR".to_string(),
                        message: "Internal server error during IO operation".to_string(),
                        details: None,
                    },
                )
            }
            Self::YamlParsing(e) => {
                error!("YAML parsing error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "CONFIG_PARSE_ERROR".to_string(),
                        message: "Failed to parse configuration file".to_string(),
                        details: None,
                    },
                )
            }
            Self::HttpClientBuild(e) => {
                error!("HTTP client build error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "HTTP_CLIENT_BUILD_ERROR".to_string(),
                        message: "Internal server error building HTTP client".to_string(),
                        details: None,
                    },
                )
            }
            Self::MissingGstin => (
                StatusCode::BAD_REQUEST,
                ErrorDetails {
                    error_type: "MISSING_GSTIN".to_string(),
                    message: "Please provide a GSTIN".to_string(),
                    details: None,
                },
            ),
            Self::AllKeysExhausted(report) => {
                error!(
                    attempts = report.attempts.len(),
                    "GSTIN lookup exhausted all keys"
                );
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorDetails {
                        error_type: "ALL_KEYS_EXHAUSTED".to_string(),
                        message: "GSTIN lookup failed with every configured key".to_string(),
                        details: Some(report.to_string()),
                    },
                )
            }
            Self::Internal(msg) => {
                error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "INTERNAL_SERVER_ERROR".to_string(),
                        message: "An unexpected internal server error occurred".to_string(),
                        details: None,
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_details) = self.to_status_and_details();
        let body = Json(ErrorResponse {
            error: error_details,
        });
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
