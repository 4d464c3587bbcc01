//! HTTP-facing side of the toolbar.
//!
//! # Data Flow
//! ```text
//! request
//!     → access.rs (engagement: enabled, excluded paths, peer hosts)
//!     → middleware.rs (tower layer / from_fn, run handler once)
//!     → outcome.rs (classify response, redirect, framework error, failure)
//!     → response with toolbar injected
//! ```
//! Handlers reach the toolbar through `diagnostics.rs`.

pub mod access;
pub mod diagnostics;
pub mod middleware;
pub mod outcome;

pub use access::{AccessPolicy, HostNet, FAVICON_PATH};
pub use diagnostics::Diagnostics;
pub use middleware::{debug_toolbar_middleware, handle, DebugToolbarLayer, DebugToolbarService};
pub use outcome::{
    handle_error, FailureInfo, HandlerError, HttpException, HttpRedirect, Outcome, Raised, RedirectContext,
    REDIRECT_CODES,
};
