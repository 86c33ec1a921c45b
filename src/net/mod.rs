//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept)
//!     → connection.rs (ID + liveness guard)
//!     → Hand off to the connection handler in its own task
//! ```
//!
//! # Design Decisions
//! - No admission control: every connection is accepted and served
//! - Each connection tracked so shutdown can drain in-flight work

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};
