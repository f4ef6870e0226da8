use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClubError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ClubError {
    pub fn store(operation: &str, err: impl std::fmt::Display) -> Self {
        ClubError::StoreUnavailable(format!("{}: {}", operation, err))
    }
}

impl From<validator::ValidationErrors> for ClubError {
    fn from(err: validator::ValidationErrors) -> Self {
        ClubError::InvalidArgument(err.to_string())
    }
}

impl From<mongodb::error::Error> for ClubError {
    fn from(err: mongodb::error::Error) -> Self {
        ClubError::StoreUnavailable(err.to_string())
    }
}

impl From<ClubError> for AppError {
    fn from(err: ClubError) -> Self {
        match err {
            ClubError::NotFound(e) => AppError::NotFound(anyhow::anyhow!(e)),
            ClubError::InvalidArgument(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ClubError::PermissionDenied(e) => AppError::Forbidden(anyhow::anyhow!(e)),
            ClubError::StoreUnavailable(e) => AppError::DatabaseError(anyhow::anyhow!(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_maps_onto_http_errors() {
        let err: AppError = ClubError::PermissionDenied("no actor".into()).into();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        let err: AppError = ClubError::InvalidArgument("page".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let err: AppError = ClubError::NotFound("group g1".into()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
