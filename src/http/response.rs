//! Diagnostic responses written by the proxy itself.
//!
//! Origin responses are relayed byte-for-byte and never pass through here.
//! These are only sent when the proxy refuses or cannot complete a request.

use std::fmt;

/// A response the proxy synthesizes before closing the client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// Unparseable request line or request target.
    BadRequest,
    /// Any method other than GET.
    NotImplemented,
    /// The origin could not be reached.
    BadGateway,
}

impl Diagnostic {
    pub fn status(&self) -> u16 {
        match self {
            Diagnostic::BadRequest => 400,
            Diagnostic::NotImplemented => 501,
            Diagnostic::BadGateway => 502,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Diagnostic::BadRequest => "Bad Request",
            Diagnostic::NotImplemented => "Not Implemented",
            Diagnostic::BadGateway => "Bad Gateway",
        }
    }

    /// Render a complete HTTP/1.0 response with a short HTML body.
    pub fn render(&self, detail: &str) -> Vec<u8> {
        let body = format!(
            "<html><title>Proxy Error</title><body>\r\n{} {}\r\n<p>{}</p>\r\n</body></html>\r\n",
            self.status(),
            self.reason(),
            escape(detail),
        );
        let mut out = format!(
            "HTTP/1.0 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status(),
            self.reason(),
            body.len(),
        )
        .into_bytes();
        out.extend_from_slice(body.as_bytes());
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status(), self.reason())
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
