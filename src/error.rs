//! Per-connection error type.

use thiserror::Error;

use crate::http::{Diagnostic, RequestError, TargetError};
use crate::origin::OriginError;
use crate::proxy::relay::RelayError;

/// Everything that can end a connection early. None of these are fatal to
/// the process; the handler logs them and closes the connection.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("method {0} not implemented")]
    UnsupportedMethod(String),

    #[error("bad request target: {0}")]
    Target(#[from] TargetError),

    #[error(transparent)]
    Origin(#[from] OriginError),

    #[error("relay aborted: {0}")]
    Relay(#[from] RelayError),

    #[error("writing cached response to client failed: {0}")]
    ClientWrite(#[source] std::io::Error),

    #[error("client did not take the cached response within {secs}s")]
    ClientStalled { secs: u64 },
}

impl ProxyError {
    /// Response to send the client before closing, if one is still possible.
    ///
    /// Nothing is sent once response bytes may already have reached the
    /// client, or when the client itself is gone.
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        match self {
            ProxyError::Request(RequestError::MalformedLine(_))
            | ProxyError::Request(RequestError::LineTooLong)
            | ProxyError::Target(_) => Some(Diagnostic::BadRequest),
            ProxyError::UnsupportedMethod(_) => Some(Diagnostic::NotImplemented),
            ProxyError::Origin(_) => Some(Diagnostic::BadGateway),
            ProxyError::Request(_)
            | ProxyError::Relay(_)
            | ProxyError::ClientWrite(_)
            | ProxyError::ClientStalled { .. } => None,
        }
    }

    /// Client-side problems are routine and logged quietly.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            ProxyError::Request(_)
                | ProxyError::UnsupportedMethod(_)
                | ProxyError::Target(_)
                | ProxyError::ClientStalled { .. }
        )
    }
}
