use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// The assignment table (or its schema) does not exist.
    StoreUnavailable(String),
    PermissionDenied(String),
    /// A write reported success but touched no rows.
    ZeroRowsAffected(String),
    TransientFailure(String),
    /// Mutations are disabled while the engine runs on defaults only.
    ReadOnly(String),
    NothingToUndo,
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    InternalServerError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::StoreUnavailable(msg) => write!(f, "Store Unavailable: {}", msg),
            AppError::PermissionDenied(msg) => write!(f, "Permission Denied: {}", msg),
            AppError::ZeroRowsAffected(msg) => write!(f, "No Rows Affected: {}", msg),
            AppError::TransientFailure(msg) => write!(f, "Transient Failure: {}", msg),
            AppError::ReadOnly(msg) => write!(f, "Read Only: {}", msg),
            AppError::NothingToUndo => write!(f, "Nothing to undo"),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::ZeroRowsAffected(_) => StatusCode::CONFLICT,
            AppError::TransientFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::ReadOnly(_) => StatusCode::LOCKED,
            AppError::NothingToUndo => StatusCode::NOT_FOUND,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            AppError::StoreUnavailable("missing".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::PermissionDenied("nope".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::ZeroRowsAffected("move".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::ReadOnly("fallback".into()).status_code(), StatusCode::LOCKED);
        assert_eq!(AppError::NothingToUndo.status_code(), StatusCode::NOT_FOUND);
    }
}
