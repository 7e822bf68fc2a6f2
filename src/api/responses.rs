// Response types for API endpoints

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

/// Successful login response - the only place the plaintext token appears
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// API error type that converts domain errors to HTTP responses
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub request_id: Option<String>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: StatusCode, message: String) -> Self {
        Self {
            status,
            message,
            request_id: None,
        }
    }

    /// Create from AppError
    pub fn from_app_error(err: crate::core::errors::AppError) -> Self {
        let status = StatusCode::from_u16(err.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = err.user_message();
        Self {
            status,
            message,
            request_id: None,
        }
    }

    /// Create from AppError with request ID
    pub fn from_app_error_with_id(
        err: crate::core::errors::AppError,
        request_id: String,
    ) -> Self {
        let status = StatusCode::from_u16(err.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = err.user_message();
        Self {
            status,
            message,
            request_id: Some(request_id),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            request_id: self.request_id,
        });
        (self.status, body).into_response()
    }
}

impl From<crate::core::errors::AppError> for ApiError {
    fn from(err: crate::core::errors::AppError) -> Self {
        ApiError::from_app_error(err)
    }
}

/// Rejection produced by the auth middleware
///
/// API clients get a JSON 401; browser clients get a 302 to the login page,
/// matching the framework-default unauthenticated flow.
#[derive(Debug)]
pub enum AuthFailure {
    Api(ApiError),
    Redirect { location: String },
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        match self {
            AuthFailure::Api(err) => err.into_response(),
            AuthFailure::Redirect { location } => {
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
            }
        }
    }
}
