use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use ephemera_core::EngineError;
use ephemera_types::api::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::NotFound => StatusCode::NOT_FOUND,
                EngineError::Expired(_) => StatusCode::GONE,
                EngineError::Denied | EngineError::Forbidden => StatusCode::FORBIDDEN,
                EngineError::Conflict | EngineError::NotArmable => StatusCode::CONFLICT,
                EngineError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                EngineError::Invalid(_) => StatusCode::BAD_REQUEST,
            },
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Engine errors carry no store detail, so their display text is safe to
/// return as-is.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use ephemera_core::UnavailableReason;

    use super::*;

    #[test]
    fn store_failures_surface_as_unavailable_without_detail() {
        let err = ApiError::from(EngineError::StoreUnavailable);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "message store unavailable");
    }

    #[test]
    fn expiry_maps_to_gone() {
        let err = ApiError::from(EngineError::Expired(UnavailableReason::ViewLimitReached));
        assert_eq!(err.status(), StatusCode::GONE);
        assert!(err.to_string().contains("view_limit_reached"));
    }
}
