//! Origin connections and request forwarding.
//!
//! # Responsibilities
//! - Connect to `host:port` under a connect timeout
//! - Classify DNS, refusal and timeout failures as an unreachable origin
//! - Send a rebuilt HTTP/1.0 GET with a fixed, normalized header block

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::OriginConfig;
use crate::http::Target;

/// Errors talking to an origin server.
#[derive(Debug, Error)]
pub enum OriginError {
    /// Name resolution failed or the connection was refused.
    #[error("origin {authority} unreachable: {source}")]
    Unreachable {
        authority: String,
        #[source]
        source: std::io::Error,
    },

    /// No connection within the configured timeout.
    #[error("connect to origin {authority} timed out after {secs}s")]
    ConnectTimeout { authority: String, secs: u64 },

    /// Only GET is ever forwarded.
    #[error("method {0} cannot be forwarded")]
    UnsupportedMethod(String),

    /// Writing the request to the origin failed.
    #[error("failed to send request to origin: {0}")]
    Send(#[source] std::io::Error),
}

impl OriginError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OriginError::Unreachable { .. } => "unreachable",
            OriginError::ConnectTimeout { .. } => "timeout",
            OriginError::UnsupportedMethod(_) => "method",
            OriginError::Send(_) => "send",
        }
    }
}

/// Opens origin connections and writes normalized requests to them.
#[derive(Debug, Clone)]
pub struct OriginConnector {
    connect_timeout: Duration,
    user_agent: String,
}

impl OriginConnector {
    pub fn new(config: &OriginConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            user_agent: config.user_agent.clone(),
        }
    }

    /// Connect to the target's `host:port`.
    pub async fn connect(&self, target: &Target) -> Result<TcpStream, OriginError> {
        let authority = target.authority();
        match timeout(self.connect_timeout, TcpStream::connect(authority.as_str())).await {
            Ok(Ok(stream)) => {
                tracing::debug!(origin = %authority, "Connected to origin");
                Ok(stream)
            }
            Ok(Err(source)) => Err(OriginError::Unreachable { authority, source }),
            Err(_) => Err(OriginError::ConnectTimeout {
                authority,
                secs: self.connect_timeout.as_secs(),
            }),
        }
    }

    /// The exact bytes sent to the origin for `target`.
    pub fn build_request(&self, target: &Target) -> String {
        format!(
            "GET {} HTTP/1.0\r\n\
             Host: {}\r\n\
             User-Agent: {}\r\n\
             Connection: close\r\n\
             Proxy-Connection: close\r\n\
             \r\n",
            target.path, target.host, self.user_agent
        )
    }

    /// Write the normalized request for `target` to `origin`.
    pub async fn forward<W>(
        &self,
        origin: &mut W,
        method: &str,
        target: &Target,
    ) -> Result<(), OriginError>
    where
        W: AsyncWrite + Unpin,
    {
        if !method.eq_ignore_ascii_case("GET") {
            return Err(OriginError::UnsupportedMethod(method.to_string()));
        }
        let request = self.build_request(target);
        tracing::debug!(path = %target.path, host = %target.host, "Forwarding request");
        origin
            .write_all(request.as_bytes())
            .await
            .map_err(OriginError::Send)?;
        origin.flush().await.map_err(OriginError::Send)
    }
}
