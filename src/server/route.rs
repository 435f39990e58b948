//! Handshake inspection
//!
//! Decides from the upgrade request which endpoint a connection wants and
//! whether its origin is acceptable. Bad requests are refused with an HTTP
//! error before the WebSocket is established.

use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request};
use tokio_tungstenite::tungstenite::http::StatusCode;

/// Path prefix for channel connections
pub const CHANNEL_PREFIX: &str = "/t/";

/// Path of the echo endpoint
pub const ECHO_PATH: &str = "/test/echo";

/// Endpoint requested by a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Attach to the named channel
    Channel(String),
    /// Send every frame straight back
    Echo,
}

impl Route {
    /// Resolve a request path; `None` for unknown paths and empty channel names
    pub fn parse(path: &str) -> Option<Route> {
        if path == ECHO_PATH {
            return Some(Route::Echo);
        }

        match path.strip_prefix(CHANNEL_PREFIX) {
            Some(name) if !name.is_empty() => Some(Route::Channel(name.to_owned())),
            _ => None,
        }
    }
}

/// What the handshake callback learned about a connection
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Requested endpoint
    pub route: Route,
    /// `Sec-WebSocket-Key`, used as the client identity
    pub key: Option<String>,
}

impl Handshake {
    /// Inspect an upgrade request
    pub fn inspect(request: &Request, allow_origin: &str) -> Result<Handshake, ErrorResponse> {
        let path = request.uri().path();
        let route = Route::parse(path)
            .ok_or_else(|| reject(StatusCode::NOT_FOUND, "No such endpoint"))?;

        let origin = match request.headers().get("origin") {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| reject(StatusCode::FORBIDDEN, "Malformed origin"))?,
            ),
            None => None,
        };
        if !origin_allowed(allow_origin, origin) {
            tracing::info!(origin = ?origin, "Origin rejected");
            return Err(reject(StatusCode::FORBIDDEN, "Origin not allowed"));
        }

        let key = request
            .headers()
            .get("sec-websocket-key")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        Ok(Handshake { route, key })
    }
}

/// Whether `origin` passes the `allow` rule
///
/// `*` accepts everything. Otherwise the origin's host (and port, if any) must
/// end with `allow`. Requests without an origin header are not from browsers
/// and are accepted.
pub fn origin_allowed(allow: &str, origin: Option<&str>) -> bool {
    if allow == "*" {
        return true;
    }

    let Some(origin) = origin else {
        return true;
    };

    let without_scheme = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    let netloc = without_scheme.split('/').next().unwrap_or_default();

    netloc.ends_with(allow)
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_owned()));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use tokio_tungstenite::tungstenite::http::HeaderValue;

    use super::*;

    fn request(path: &str, origin: Option<&str>) -> Request {
        let mut builder = Request::builder()
            .uri(path)
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==");
        if let Some(origin) = origin {
            builder = builder.header("origin", origin);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_parse_routes() {
        assert_eq!(Route::parse("/t/lobby"), Some(Route::Channel("lobby".into())));
        assert_eq!(Route::parse("/t/a/b"), Some(Route::Channel("a/b".into())));
        assert_eq!(Route::parse("/test/echo"), Some(Route::Echo));
        assert_eq!(Route::parse("/t/"), None);
        assert_eq!(Route::parse("/other"), None);
    }

    #[test]
    fn test_origin_rules() {
        assert!(origin_allowed("*", Some("http://evil.test")));
        assert!(origin_allowed("example.com", None));
        assert!(origin_allowed("example.com", Some("https://app.example.com")));
        assert!(origin_allowed("example.com", Some("https://example.com/page")));
        assert!(!origin_allowed("example.com", Some("https://example.com.evil.test")));
        assert!(!origin_allowed("example.com", Some("https://example.com:8443")));
    }

    #[test]
    fn test_inspect_captures_key() {
        let handshake = Handshake::inspect(&request("/t/lobby", None), "*").unwrap();

        assert_eq!(handshake.route, Route::Channel("lobby".into()));
        assert_eq!(handshake.key.as_deref(), Some("dGhlIHNhbXBsZSBub25jZQ=="));
    }

    #[test]
    fn test_inspect_rejects_unknown_path() {
        let response = Handshake::inspect(&request("/nope", None), "*").unwrap_err();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_inspect_rejects_foreign_origin() {
        let req = request("/t/lobby", Some("https://other.test"));
        let response = Handshake::inspect(&req, "example.com").unwrap_err();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_inspect_rejects_malformed_origin() {
        let req = Request::builder()
            .uri("/t/lobby")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
            .header("origin", HeaderValue::from_bytes(b"https://\xffexample.com").unwrap())
            .body(())
            .unwrap();

        let response = Handshake::inspect(&req, "example.com").unwrap_err();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
