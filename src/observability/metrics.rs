//! Toolbar metrics.
//!
//! # Metrics
//! - `debug_toolbar_requests_total` (counter): handled requests by outcome
//! - `debug_toolbar_exceptions_total` (counter): captured tracebacks
//! - `debug_toolbar_history_evictions_total` (counter): evictions by store
//!
//! # Design Decisions
//! - No exporter is installed here; without a recorder the calls are no-ops

pub const REQUESTS_TOTAL: &str = "debug_toolbar_requests_total";
pub const EXCEPTIONS_TOTAL: &str = "debug_toolbar_exceptions_total";
pub const EVICTIONS_TOTAL: &str = "debug_toolbar_history_evictions_total";

/// Count a request the toolbar engaged on.
///
/// `outcome` is one of `response`, `redirect`, `exception`, `propagated`.
pub fn record_request(outcome: &'static str) {
    metrics::counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_exception() {
    metrics::counter!(EXCEPTIONS_TOTAL).increment(1);
}

pub fn record_eviction(store: &'static str) {
    metrics::counter!(EVICTIONS_TOTAL, "store" => store).increment(1);
}
