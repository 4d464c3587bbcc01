//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! middleware, history, panels
//!     → logging.rs (tracing subscriber, optional LogCollector layer)
//!     → metrics.rs (request, exception and eviction counters)
//! ```
//!
//! # Design Decisions
//! - Structured `tracing` fields (`request_id`, `path`, `status`, `panel`)
//! - Metrics go through the `metrics` facade; the host picks the exporter
//! - The toolbar's own log capture sees every event, whatever the fmt filter

pub mod logging;
pub mod metrics;
