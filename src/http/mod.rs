//! Minimal HTTP/1.0 protocol handling.
//!
//! # Data Flow
//! ```text
//! Client connection
//!     → request.rs (request line, drain headers)
//!     → target.rs (scheme://host[:port][/path] → Target)
//!     → [cache / origin]
//!     → response.rs (only when the proxy itself must answer)
//! ```
//!
//! # Design Decisions
//! - One request per connection, no keep-alive or chunked encoding
//! - Responses from the origin are relayed raw, never re-framed

pub mod request;
pub mod response;
pub mod target;

pub use request::{read_request, RequestError, RequestHead};
pub use response::Diagnostic;
pub use target::{parse_target, Target, TargetError};
