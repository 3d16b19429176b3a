//! Response head seen by matcher conditions

use http::{header, response, HeaderMap, HeaderValue, Response, StatusCode, Version};

/// Status and headers of a proxied response, as received from upstream
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// Response status
    pub status: StatusCode,

    /// HTTP version
    pub version: Version,

    /// Response headers
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// Create a response head with the given status and no headers
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
        }
    }

    /// Set a header, replacing any previous value
    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Raw `content-encoding` header, if any
    pub fn content_encoding(&self) -> Option<&HeaderValue> {
        self.headers.get(header::CONTENT_ENCODING)
    }

    /// `content-type` header as a string
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

impl Default for ResponseHead {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl From<&response::Parts> for ResponseHead {
    fn from(parts: &response::Parts) -> Self {
        Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers.clone(),
        }
    }
}

impl<B> From<&Response<B>> for ResponseHead {
    fn from(res: &Response<B>) -> Self {
        Self {
            status: res.status(),
            version: res.version(),
            headers: res.headers().clone(),
        }
    }
}
