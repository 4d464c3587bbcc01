//! Toolbar error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Boxed error used at the tower service boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type ToolbarResult<T> = Result<T, ToolbarError>;

/// Errors raised by the toolbar itself.
#[derive(Debug, Error)]
pub enum ToolbarError {
    /// The middleware ran without a `ToolbarState` installed on the app.
    #[error("debug toolbar is not initialized; install ToolbarState with Extension before the middleware")]
    NotInitialized,

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("panel '{panel}' failed: {message}")]
    Panel { panel: &'static str, message: String },
}

impl IntoResponse for ToolbarError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Debug toolbar error");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
