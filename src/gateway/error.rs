use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::csrf::CsrfRejected;

/// Errors returned by the gateway's own endpoints.
///
/// The forward-auth endpoint never produces these: it answers with a redirect instead.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No valid session found.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Unknown user or wrong password; deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// OAuth state failed validation.
    #[error(transparent)]
    Csrf(#[from] CsrfRejected),

    /// Origin or host is not one this platform serves.
    #[error("Forbidden origin")]
    ForbiddenOrigin,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Feature not configured.
    #[error("Not found")]
    NotFound,

    /// Collaborator or internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub(super) fn internal(e: impl std::fmt::Display) -> Self {
        Self::Internal(e.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Csrf(_) | Self::ForbiddenOrigin => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients.
    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal error".into(),
            Self::Csrf(_) => "CSRF validation failed".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref detail) = self {
            tracing::error!(error = %detail, "Gateway internal error");
        }
        let body = serde_json::json!({ "error": self.client_message() });
        (self.status(), Json(body)).into_response()
    }
}
