use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for everything that crosses a handler boundary. A chat
/// response with no recognizable change blocks is a zero-result, not an
/// error, so it does not appear here.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    /// A collaborator returned non-success or a payload we could not
    /// shape-validate.
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    LocalIo(String),

    #[error("command timed out after {0} seconds")]
    Timeout(u64),

    #[error("{0}")]
    BadRequest(String),

    /// A chat turn is already in flight; concurrent turns are rejected
    /// rather than queued.
    #[error("a chat turn is already in progress")]
    TurnInFlight,
}

impl ApiError {
    pub fn upstream(context: &str, err: impl std::fmt::Display) -> Self {
        ApiError::Upstream(format!("{}: {}", context, err))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::LocalIo(err.to_string())
    }
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::LocalIo(_) | ApiError::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TurnInFlight => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(json!({ "success": false, "error": self.to_string() }))
    }
}
