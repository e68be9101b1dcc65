//! Mapping of manager errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use openapi_server::models::ApiResponse;
use tracing::{error, warn};

use crate::errors::ManagerError;

impl ManagerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ManagerError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ManagerError::NotFound(_) => StatusCode::NOT_FOUND,
            ManagerError::Forbidden(_) => StatusCode::FORBIDDEN,
            e if e.is_upstream() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ManagerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        (status, Json(ApiResponse::error(self.to_string()))).into_response()
    }
}
