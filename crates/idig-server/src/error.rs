use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use idig_repo::RepoError;
use idig_sync::SyncError;

/// Errors surfaced by the HTTP adapter.
///
/// Status mapping: bad credentials are 401, malformed requests and
/// unresolvable versions are 400, everything else (forbidden writes, missing
/// objects, store failures) is 500. Bodies are `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotAuthenticated(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotAuthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Repo(RepoError::InvalidVersion(_))
            | Self::Sync(SyncError::Repo(RepoError::InvalidVersion(_))) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        tracing::warn!(%status, error = %message, "request failed");
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
