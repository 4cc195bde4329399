use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// A schema violation tied to a single field of the request body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    Unauthorized,
    BadRequest(String),
    Validation(Vec<FieldError>),
    PayloadTooLarge,
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message, details) = match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                "Invalid or missing API key".to_string(),
                None,
            ),
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "Bad Request", message, None)
            }
            AppError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                "Validation Error",
                "Invalid request body".to_string(),
                Some(details),
            ),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Payload Too Large",
                "Request body exceeds the maximum allowed size".to_string(),
                None,
            ),
            AppError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Server Error", message, None)
            }
        };

        let body = Json(ErrorResponse {
            error,
            message,
            details,
        });

        (status, body).into_response()
    }
}
