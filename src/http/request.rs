//! Client request reading.
//!
//! # Responsibilities
//! - Read exactly one request line (`METHOD SP target SP version`)
//! - Drain header lines up to the empty line that ends the head
//! - Bound every line so a misbehaving client cannot grow the buffer forever
//!
//! Header contents are discarded unread, so they may carry any bytes; only the
//! request line has to be UTF-8. The origin request is rebuilt from scratch.

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest request or header line accepted, terminator included.
pub const MAX_LINE: usize = 8192;

/// Errors raised while reading a request head.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The client closed the connection before sending a request line.
    #[error("client closed the connection before sending a request")]
    Closed,

    /// The request line does not have method, target and version, or is not UTF-8.
    #[error("malformed request line: {0:?}")]
    MalformedLine(String),

    /// A line exceeded [`MAX_LINE`] bytes.
    #[error("request line exceeds the maximum line length")]
    LineTooLong,

    /// Socket failure.
    #[error("failed to read request: {0}")]
    Io(#[from] std::io::Error),
}

/// The parsed request line plus bookkeeping about the drained headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub uri: String,
    pub version: String,
    /// Number of header lines consumed and dropped.
    pub header_count: usize,
}

impl RequestHead {
    /// Only `GET` is serviced; the comparison ignores ASCII case.
    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// Read one request head from `reader`.
///
/// A missing final empty line (client half-closed after the headers) is
/// tolerated and treated as the end of the head.
pub async fn read_request<R>(reader: &mut R) -> Result<RequestHead, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    if read_line(reader, &mut line).await? == 0 {
        return Err(RequestError::Closed);
    }

    let request_line = match std::str::from_utf8(&line) {
        Ok(text) => text,
        Err(_) => {
            return Err(RequestError::MalformedLine(
                String::from_utf8_lossy(&line).trim_end().to_string(),
            ))
        }
    };
    let mut parts = request_line.split_whitespace();
    let (method, uri, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(u), Some(v)) => (m.to_string(), u.to_string(), v.to_string()),
        _ => return Err(RequestError::MalformedLine(request_line.trim_end().to_string())),
    };

    let mut header_count = 0;
    loop {
        line.clear();
        let n = read_line(reader, &mut line).await?;
        if n == 0 || line == b"\r\n" || line == b"\n" {
            break;
        }
        header_count += 1;
        tracing::trace!(header = %String::from_utf8_lossy(&line).trim_end(), "Dropping client header");
    }

    Ok(RequestHead {
        method,
        uri,
        version,
        header_count,
    })
}

async fn read_line<R>(reader: &mut R, line: &mut Vec<u8>) -> Result<usize, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let n = (&mut *reader).take(MAX_LINE as u64).read_until(b'\n', line).await?;
    if n == MAX_LINE && !line.ends_with(b"\n") {
        return Err(RequestError::LineTooLong);
    }
    Ok(n)
}
