//! Streaming relay from origin to client with a bounded capture.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bytes read from the origin per step.
pub const RELAY_CHUNK: usize = 8 * 1024;

/// I/O failure on one side of the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("reading from origin failed: {0}")]
    Origin(#[source] std::io::Error),

    #[error("writing to client failed: {0}")]
    Client(#[source] std::io::Error),
}

/// Copy of a response kept for caching, abandoned once it exceeds `limit`.
#[derive(Debug)]
pub struct Capture {
    buf: Vec<u8>,
    limit: usize,
    overflowed: bool,
}

impl Capture {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            overflowed: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if self.overflowed {
            return;
        }
        if self.buf.len() + chunk.len() > self.limit {
            self.overflowed = true;
            self.buf = Vec::new();
        } else {
            self.buf.extend_from_slice(chunk);
        }
    }

    pub fn is_cacheable(&self) -> bool {
        !self.overflowed
    }

    /// The captured bytes, or `None` if the response outgrew the limit.
    pub fn into_body(self) -> Option<Vec<u8>> {
        (!self.overflowed).then_some(self.buf)
    }
}

/// Result of a relay that reached end-of-stream on the origin.
#[derive(Debug)]
pub struct RelayOutcome {
    /// Bytes delivered to the client.
    pub bytes: u64,
    /// Full response, when it fit within the capture limit.
    pub captured: Option<Vec<u8>>,
}

/// Copy `origin` to `client` chunk by chunk until the origin closes.
///
/// Each chunk is written to the client before the next one is read. Any I/O
/// error ends the relay and discards the capture.
pub async fn relay<R, W>(origin: &mut R, client: &mut W, limit: usize) -> Result<RelayOutcome, RelayError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut chunk = vec![0u8; RELAY_CHUNK];
    let mut capture = Capture::new(limit);
    let mut bytes = 0u64;

    loop {
        let n = origin.read(&mut chunk).await.map_err(RelayError::Origin)?;
        if n == 0 {
            break;
        }
        client
            .write_all(&chunk[..n])
            .await
            .map_err(RelayError::Client)?;
        capture.push(&chunk[..n]);
        bytes += n as u64;
    }
    client.flush().await.map_err(RelayError::Client)?;

    if !capture.is_cacheable() {
        tracing::debug!(bytes, limit, "Response too large to cache");
    }

    Ok(RelayOutcome {
        bytes,
        captured: capture.into_body(),
    })
}
