//! Public API types

use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::events::EventError;

// Errors

pub struct ApiError(anyhow::Error);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<EventError>() {
            Some(EventError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(e) if e.is_input_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert `ApiError` into an Axum compatible response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{:#}", self.0);
            (status, format!("Something went wrong: {}", self.0)).into_response()
        } else {
            tracing::debug!("Rejected request: {}", self.0);
            (status, self.0.to_string()).into_response()
        }
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// Re-export public types from each route

pub mod discord {
    pub use crate::api::routes::discord::public::*;
}

pub mod events {
    pub use crate::api::routes::events::public::*;
}
