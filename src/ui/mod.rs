//! The toolbar's own web UI.
//!
//! Mounted at `path_prefix`; the middleware never records requests to it.

pub mod handlers;
pub mod templates;

use axum::routing::get;
use axum::Router;

use crate::state::ToolbarState;
use self::handlers::*;

pub use templates::Templates;

/// Routes of the toolbar UI, relative to the mount point.
pub fn router(state: ToolbarState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/requests/{id}", get(request_page))
        .route("/exceptions/{id}", get(exception_page))
        .route("/exceptions/{id}/frames/{index}", get(frame_source))
        .route("/api/requests", get(api_requests))
        .route("/static/toolbar.css", get(stylesheet))
        .with_state(state)
}

/// Nest the toolbar UI into `app` at the configured root path.
pub fn attach(app: Router, state: &ToolbarState) -> Router {
    match state.config().root_path() {
        // axum refuses to nest at the root
        "/" => app.merge(router(state.clone())),
        root => app.nest(root, router(state.clone())),
    }
}
