//! Request head seen by matcher conditions

use http::{request, HeaderMap, Method, Request, Uri, Version};

/// The parts of the originating request a condition can inspect
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// HTTP method
    pub method: Method,

    /// Request URI as received by the proxy
    pub uri: Uri,

    /// HTTP version
    pub version: Version,

    /// Request headers
    pub headers: HeaderMap,
}

impl RequestHead {
    /// Create a GET request head for the given URI
    pub fn new(uri: Uri) -> Self {
        Self {
            method: Method::GET,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
        }
    }

    /// Request path without the query string
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Get a header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl Default for RequestHead {
    fn default() -> Self {
        Self::new(Uri::from_static("/"))
    }
}

impl From<&request::Parts> for RequestHead {
    fn from(parts: &request::Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
        }
    }
}

impl<B> From<&Request<B>> for RequestHead {
    fn from(req: &Request<B>) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            version: req.version(),
            headers: req.headers().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_head_from_request() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/users?page=2")
            .header("X-Tenant", "acme")
            .body(())
            .unwrap();

        let head = RequestHead::from(&req);
        assert_eq!(head.method, Method::POST);
        assert_eq!(head.path(), "/api/users");
        assert_eq!(head.header("x-tenant"), Some("acme"));
    }

    #[test]
    fn test_default_head() {
        let head = RequestHead::default();
        assert_eq!(head.path(), "/");
        assert!(head.headers.is_empty());
    }
}
