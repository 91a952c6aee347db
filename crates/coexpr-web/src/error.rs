//! Maps engine errors onto the `{error, details}` HTTP body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use coexpr_common::error::CoexprError;

#[derive(Debug)]
pub struct ApiError(pub CoexprError);

impl From<CoexprError> for ApiError {
    fn from(err: CoexprError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            CoexprError::InvalidInput(_) | CoexprError::LengthMismatch { .. } => StatusCode::BAD_REQUEST,
            CoexprError::NotFound(_) => StatusCode::NOT_FOUND,
            CoexprError::FetchFailure { .. } => StatusCode::BAD_GATEWAY,
            CoexprError::Source(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self.0);
        }
        let body = serde_json::json!({
            "error": self.0.kind(),
            "details": self.0.details(),
        });
        (status, Json(body)).into_response()
    }
}
