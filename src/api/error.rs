//! API Error Responses
//! Mission: Render every failure as a JSON body with the right status

use crate::error::ServiceError;
use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Errors returned by HTTP handlers
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    /// Request body could not be read as JSON of the expected shape
    MalformedBody(String),
    /// A blocking task panicked or was cancelled
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Service(e) => match e {
                ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                ServiceError::Conflict(_) => StatusCode::CONFLICT,
                ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
                ServiceError::Forbidden => StatusCode::FORBIDDEN,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Storage(_) | ServiceError::Hashing(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code_and_message(&self) -> (&'static str, String) {
        match self {
            ApiError::Service(e) => match e {
                ServiceError::InvalidInput(msg) => ("invalid_input", msg.clone()),
                ServiceError::Conflict(msg) => ("conflict", msg.clone()),
                ServiceError::Unauthorized => {
                    ("unauthorized", "Invalid or missing credentials".to_string())
                }
                ServiceError::Forbidden => ("forbidden", "Insufficient permissions".to_string()),
                ServiceError::NotFound(what) => ("not_found", format!("{} not found", what)),
                ServiceError::Storage(_) | ServiceError::Hashing(_) => internal(),
            },
            ApiError::MalformedBody(msg) => ("invalid_input", msg.clone()),
            ApiError::Internal(_) => internal(),
        }
    }
}

fn internal() -> (&'static str, String) {
    ("internal_error", "Internal server error".to_string())
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError::Service(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Details of server-side failures stay in the log
        match &self {
            ApiError::Service(e) if e.is_internal() => error!("Request failed: {}", e),
            ApiError::Internal(detail) => error!("Request task failed: {}", detail),
            _ => {}
        }

        let (code, message) = self.code_and_message();
        let body = Json(json!({
            "error": code,
            "message": message,
        }));

        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;

    #[test]
    fn test_api_error_statuses() {
        let cases = [
            (ServiceError::invalid("bad"), StatusCode::BAD_REQUEST),
            (ServiceError::Conflict("dup".to_string()), StatusCode::CONFLICT),
            (ServiceError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden, StatusCode::FORBIDDEN),
            (ServiceError::NotFound("item".to_string()), StatusCode::NOT_FOUND),
            (
                ServiceError::Storage(StoreError::Corrupt("x".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), expected);
        }
    }

    #[test]
    fn test_unauthorized_carries_challenge() {
        let response = ApiError::from(ServiceError::Unauthorized).into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let error = ApiError::from(ServiceError::Storage(StoreError::Corrupt(
            "/var/lib/catalog/items.json".to_string(),
        )));
        let (code, message) = error.code_and_message();

        assert_eq!(code, "internal_error");
        assert!(!message.contains("items.json"));
    }
}
