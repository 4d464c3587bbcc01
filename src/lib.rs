//! In-process debug toolbar for axum / tower applications.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http::middleware ──▶ toolbar (panels wrap the handler)
//!                          │                    │
//!                          │                    ▼
//!                          │              ContextSwitcher::run(handler)
//!                          │                    │
//!                          ▼                    ▼
//!                    http::outcome ◀──── response / error / panic
//!                          │
//!          ┌───────────────┼─────────────────────┐
//!          ▼               ▼                     ▼
//!   redirect page    traceback capture     finalize panels
//!                          │                     │
//!                          ▼                     ▼
//!                  exception history      request history ──▶ ui (toolbar pages)
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use axum::{error_handling::HandleErrorLayer, routing::get, Router};
//! use debug_toolbar::{handle_error, ui, DebugToolbarLayer, ToolbarConfig, ToolbarState};
//! use tower::ServiceBuilder;
//!
//! let state = ToolbarState::new(ToolbarConfig::default()).unwrap();
//! let app = Router::new()
//!     .route("/", get(|| async { "hello" }))
//!     .layer(
//!         ServiceBuilder::new()
//!             .layer(HandleErrorLayer::new(handle_error))
//!             .layer(DebugToolbarLayer::new(state.clone())),
//!     );
//! let app = ui::attach(app, &state);
//! ```

// Core
pub mod config;
pub mod error;
pub mod state;

// Request pipeline
pub mod http;
pub mod panels;
pub mod toolbar;

// Storage and capture
pub mod history;
pub mod traceback;

// Cross-cutting concerns
pub mod observability;
pub mod ui;

pub use config::ToolbarConfig;
pub use error::{BoxError, ToolbarError, ToolbarResult};
pub use http::{
    debug_toolbar_middleware, handle_error, DebugToolbarLayer, Diagnostics, HandlerError, HttpException, HttpRedirect,
};
pub use panels::{LogCollector, Panel, PanelOutput};
pub use state::{ToolbarState, ToolbarStateBuilder};
