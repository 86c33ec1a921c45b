//! Caching HTTP/1.0 forward proxy library.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod origin;
pub mod proxy;

pub use cache::ObjectCache;
pub use config::ProxyConfig;
pub use error::ProxyError;
pub use lifecycle::Shutdown;
pub use proxy::ProxyServer;
