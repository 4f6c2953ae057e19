use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Rejection type for the bearer-token extractor.
///
/// Every protected route goes through the extractor, so an auth failure
/// turns into a 401 before the handler runs.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization token is missing!")]
    MissingToken,

    #[error("Token verification failed: {0}")]
    VerificationFailed(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "rejected unauthenticated request");
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": self.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_map_to_401() {
        let missing = AuthError::MissingToken.into_response();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let bad = AuthError::VerificationFailed("expired".to_string()).into_response();
        assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
    }
}
