//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ToolbarConfig (validated, immutable)
//!     → shared via Arc inside ToolbarState
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded and passed explicitly; there is no global registry
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::ToolbarConfig;
pub use validation::{validate_config, ValidationError};
