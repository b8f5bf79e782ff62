//! Minimal HTTP/1.0 framing for the time-series API.
//!
//! HTTP/1.0 with `Connection: close` keeps the response unchunked, so the body
//! is simply everything after the header block.

use core::fmt::Write;

use heapless::String;
use log::debug;

use crate::fetch::FetchError;

/// Capacity of a serialized request
pub const REQUEST_LEN: usize = 512;

/// Responses larger than this are rejected
pub const MAX_RESPONSE_BYTES: usize = 96 * 1024;

/// Port used when the configured host has none
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Split `host[:port]`.
pub fn split_host_port(host: &str) -> (&str, u16) {
    match host.rsplit_once(':') {
        Some((name, port)) => match port.parse() {
            Ok(port) => (name, port),
            Err(_) => (host, DEFAULT_HTTP_PORT),
        },
        None => (host, DEFAULT_HTTP_PORT),
    }
}

/// `GET` request for `target` (path and query) on `host`.
pub fn build_request(host: &str, target: &str) -> Result<String<REQUEST_LEN>, FetchError> {
    let mut request = String::new();
    write!(
        request,
        "GET {} HTTP/1.0\r\nHost: {}\r\nAccept: application/json\r\nConnection: close\r\n\r\n",
        target, host
    )
    .map_err(|_| FetchError::Network {
        reason: "request too long",
    })?;
    Ok(request)
}

/// Check the status line and return the body.
///
/// Any status outside 2xx is reported as [`FetchError::Http`].
pub fn response_body(raw: &[u8]) -> Result<&[u8], FetchError> {
    const MALFORMED: FetchError = FetchError::Network {
        reason: "malformed HTTP response",
    };

    let header_end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or(MALFORMED)?;
    let head = core::str::from_utf8(&raw[..header_end]).map_err(|_| MALFORMED)?;

    let status_line = head.lines().next().ok_or(MALFORMED)?;
    let mut parts = status_line.split_whitespace();
    let version = parts.next().ok_or(MALFORMED)?;
    if !version.starts_with("HTTP/") {
        return Err(MALFORMED);
    }
    let status: u16 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or(MALFORMED)?;

    debug!("HTTP {} ({} byte response)", status, raw.len());
    if !(200..300).contains(&status) {
        return Err(FetchError::Http { status });
    }

    Ok(&raw[header_end + 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("api.example.org"), ("api.example.org", 80));
        assert_eq!(split_host_port("192.168.1.20:8080"), ("192.168.1.20", 8080));
        assert_eq!(split_host_port("host:notaport"), ("host:notaport", 80));
    }

    #[test]
    fn test_build_request() {
        let request = build_request("h:8080", "/v1?site_name=Tuna&count=288").unwrap();
        assert!(request.starts_with("GET /v1?site_name=Tuna&count=288 HTTP/1.0\r\n"));
        assert!(request.contains("\r\nHost: h:8080\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_response_body_ok() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"a\":1}";
        assert_eq!(response_body(raw), Ok(&b"{\"a\":1}"[..]));
    }

    #[test]
    fn test_response_status_error() {
        let raw = b"HTTP/1.0 503 Service Unavailable\r\n\r\nbusy";
        assert_eq!(response_body(raw), Err(FetchError::Http { status: 503 }));
    }

    #[test]
    fn test_response_malformed() {
        assert!(matches!(
            response_body(b"HTTP/1.0 200 OK\r\n"),
            Err(FetchError::Network { .. })
        ));
        assert!(matches!(
            response_body(b"garbage\r\n\r\n"),
            Err(FetchError::Network { .. })
        ));
    }
}
