//! Proxy engine.
//!
//! # Data Flow
//! ```text
//! server.rs accept loop
//!     → spawn task per connection (ConnectionGuard held for its lifetime)
//!     → handler.rs: read request → parse target → cache lookup
//!         hit  → write cached body (bounded by the hit write timeout)
//!         miss → origin connect → forward → relay.rs (stream + capture)
//!              → client write side shut down → cache insert
//!     → sockets closed when the task ends, on every path
//! ```
//!
//! # Design Decisions
//! - One task per connection, no connection limit, no join
//! - Handlers share nothing but the cache
//! - Relaying is incremental; the client sees bytes before the origin finishes

pub mod handler;
pub mod relay;
pub mod server;

pub use handler::{ConnectionHandler, Outcome};
pub use server::ProxyServer;
