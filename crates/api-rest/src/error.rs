use crate::dto::ErrorRes;
use api_shared::auth::AuthError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use telecare_core::CoreError;

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    Auth(AuthError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Core(e) => match e {
                CoreError::Validation(_) | CoreError::Text(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CoreError::InvalidId(_) => StatusCode::BAD_REQUEST,
                CoreError::InvalidState { .. }
                | CoreError::AlreadyClaimed(_)
                | CoreError::AlreadyExists(_) => StatusCode::CONFLICT,
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Authorization(_) => StatusCode::FORBIDDEN,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError::Core(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            ApiError::Core(e) if e.is_internal() => {
                tracing::error!("request failed: {:?}", e);
                "Internal error".to_string()
            }
            ApiError::Core(e) => e.to_string(),
            ApiError::Auth(e) => e.to_string(),
        };
        (status, Json(ErrorRes { error })).into_response()
    }
}
