//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Wire the toolbar's [`LogCollector`] next to the fmt layer
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the built-in default filter
//! - The filter applies to the fmt layer only, so the logging panel still
//!   sees events that are not printed

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::panels::LogCollector;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "debug_toolbar=debug,tower_http=debug";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(
    default_filter: Option<&str>,
    collector: Option<&LogCollector>,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.unwrap_or(DEFAULT_FILTER).into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter))
        .with(collector.map(LogCollector::layer))
        .try_init()
}
