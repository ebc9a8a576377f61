use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use campusdesk_core::CoreError;
use tracing::error;

/// Handler-level failure: every user-initiated operation surfaces either
/// success or one of these, with a human-readable body.
pub enum ApiError {
    Core(CoreError),
    BadRequest(&'static str),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Core(err) => {
                let status = match &err {
                    CoreError::Unauthenticated | CoreError::ProfileMissing(_) => {
                        StatusCode::UNAUTHORIZED
                    }
                    CoreError::Forbidden => StatusCode::FORBIDDEN,
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::Conflict => StatusCode::CONFLICT,
                    CoreError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, err.to_string()).into_response()
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()).into_response(),
        }
    }
}

/// Map a blocking-task join failure; the task itself never panics in normal
/// operation, so log loudly when it does.
pub fn join_err(err: tokio::task::JoinError) -> ApiError {
    error!("spawn_blocking join error: {}", err);
    ApiError::Core(CoreError::Transient(anyhow::anyhow!("worker task failed")))
}
