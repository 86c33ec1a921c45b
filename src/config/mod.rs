//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → command-line port override (main.rs)
//!     → ProxyConfig (validated, immutable)
//!     → cache / origin / listener built from their sections
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults, so running without a file is the normal case
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{CacheConfig, ListenerConfig, ObservabilityConfig, OriginConfig, ProxyConfig};
pub use validation::{validate_config, ValidationError};
