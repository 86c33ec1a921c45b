//! Request-target decomposition.
//!
//! Splits an absolute-form target (`scheme://host[:port][/path]`) into the
//! pieces needed to reach the origin. No percent-decoding is performed and the
//! query string stays part of the path.

use thiserror::Error;

/// Port used when the target does not name one.
pub const DEFAULT_PORT: &str = "80";

/// Origin coordinates extracted from a request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: String,
    pub path: String,
}

impl Target {
    /// `host:port`, suitable for `TcpStream::connect`.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Errors produced while decomposing a request target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// The target carries no `://` marker.
    #[error("request target has no scheme separator: {0:?}")]
    MissingScheme(String),

    /// Nothing between `://` and the port or path.
    #[error("request target has an empty host: {0:?}")]
    EmptyHost(String),
}

/// Decompose `uri` into `(host, port, path)`.
///
/// The host runs from after `://` to the next `:` or `/`. A `:` directly after
/// the host introduces the port, which runs to the next `/`. Everything from
/// the first `/` after the authority is the path.
pub fn parse_target(uri: &str) -> Result<Target, TargetError> {
    let (_, rest) = uri
        .split_once("://")
        .ok_or_else(|| TargetError::MissingScheme(uri.to_string()))?;

    let host_end = rest.find(|c: char| c == ':' || c == '/').unwrap_or(rest.len());
    let (host, after_host) = rest.split_at(host_end);
    if host.is_empty() {
        return Err(TargetError::EmptyHost(uri.to_string()));
    }

    let (port, path) = match after_host.strip_prefix(':') {
        Some(port_and_path) => {
            let port_end = port_and_path.find('/').unwrap_or(port_and_path.len());
            port_and_path.split_at(port_end)
        }
        None => (DEFAULT_PORT, after_host),
    };

    Ok(Target {
        host: host.to_string(),
        port: port.to_string(),
        path: if path.is_empty() { "/".to_string() } else { path.to_string() },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(host: &str, port: &str, path: &str) -> Target {
        Target {
            host: host.into(),
            port: port.into(),
            path: path.into(),
        }
    }

    #[test]
    fn default_port_with_path() {
        assert_eq!(
            parse_target("http://example.com/a/b").unwrap(),
            target("example.com", "80", "/a/b")
        );
    }

    #[test]
    fn explicit_port_without_path() {
        assert_eq!(
            parse_target("http://example.com:8080").unwrap(),
            target("example.com", "8080", "/")
        );
    }

    #[test]
    fn explicit_port_and_path() {
        assert_eq!(
            parse_target("http://localhost:15213/home.html").unwrap(),
            target("localhost", "15213", "/home.html")
        );
    }

    #[test]
    fn bare_host() {
        assert_eq!(
            parse_target("http://example.com").unwrap(),
            target("example.com", "80", "/")
        );
        assert_eq!(
            parse_target("http://example.com/").unwrap(),
            target("example.com", "80", "/")
        );
    }

    #[test]
    fn query_string_kept_verbatim() {
        let t = parse_target("http://localhost:8000/cgi-bin/adder?15000&213").unwrap();
        assert_eq!(t.path, "/cgi-bin/adder?15000&213");
        assert_eq!(t.port, "8000");

        let t = parse_target("http://example.com/a%20b?x=1").unwrap();
        assert_eq!(t.path, "/a%20b?x=1");
    }

    #[test]
    fn colon_inside_path_is_not_a_port() {
        let t = parse_target("http://example.com/time:now").unwrap();
        assert_eq!(t, target("example.com", "80", "/time:now"));
    }

    #[test]
    fn missing_scheme_is_distinct_failure() {
        assert_eq!(
            parse_target("/index.html"),
            Err(TargetError::MissingScheme("/index.html".into()))
        );
        assert!(matches!(
            parse_target("example.com:80/x"),
            Err(TargetError::MissingScheme(_))
        ));
    }

    #[test]
    fn empty_host_rejected() {
        assert!(matches!(
            parse_target("http:///index.html"),
            Err(TargetError::EmptyHost(_))
        ));
    }

    #[test]
    fn authority_joins_host_and_port() {
        let t = parse_target("http://example.com:81/x").unwrap();
        assert_eq!(t.authority(), "example.com:81");
    }
}
