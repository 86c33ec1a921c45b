//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, per-connection spans)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```
//!
//! # Design Decisions
//! - Connection ID flows through every event of a handler via its span
//! - Metrics are cheap (atomic increments) and silent without a recorder

pub mod logging;
pub mod metrics;
