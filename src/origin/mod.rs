//! Origin server access.
//!
//! # Data Flow
//! ```text
//! Target (host, port, path)
//!     → connector.rs connect (timeout-bounded TCP connect)
//!     → connector.rs forward (GET path HTTP/1.0 + normalized headers)
//!     → TcpStream handed back to the relay
//! ```
//!
//! # Design Decisions
//! - Client headers are never forwarded; the header block is rebuilt
//! - Every request asks the origin to close after responding
//! - No retries: a proxy forwards once per client request

pub mod connector;

pub use connector::{OriginConnector, OriginError};
