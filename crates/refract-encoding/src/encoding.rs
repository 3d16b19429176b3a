//! Content-encoding classification

use crate::codec::Codec;
use crate::config::CompressionConfig;
use http::HeaderValue;
use refract_core::{Error, Result};
use std::fmt;

/// Classification of a response's `content-encoding` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEncoding {
    /// No encoding (header absent or empty)
    Identity,
    /// gzip
    Gzip,
    /// zlib-wrapped deflate
    Deflate,
    /// Anything else, with the raw label
    Unsupported(String),
}

impl ContentEncoding {
    /// Classify a raw header label
    ///
    /// Surrounding whitespace is ignored and matching is case-insensitive.
    /// Everything not exactly `gzip` or `deflate` is unsupported, including
    /// comma-separated lists.
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label.map(str::trim).filter(|l| !l.is_empty()) else {
            return Self::Identity;
        };

        if label.eq_ignore_ascii_case("gzip") {
            Self::Gzip
        } else if label.eq_ignore_ascii_case("deflate") {
            Self::Deflate
        } else {
            Self::Unsupported(label.to_string())
        }
    }

    /// Classify a `content-encoding` header value
    pub fn from_header(value: Option<&HeaderValue>) -> Self {
        match value {
            None => Self::Identity,
            Some(v) => match v.to_str() {
                Ok(label) => Self::from_label(Some(label)),
                Err(_) => Self::Unsupported(String::from_utf8_lossy(v.as_bytes()).into_owned()),
            },
        }
    }

    /// Get the `content-encoding` header value, `None` for identity
    pub fn encoding_name(&self) -> Option<&str> {
        match self {
            Self::Identity => None,
            Self::Gzip => Some("gzip"),
            Self::Deflate => Some("deflate"),
            Self::Unsupported(label) => Some(label),
        }
    }

    /// Whether the pipeline can rewrite bodies with this encoding
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoding_name().unwrap_or("identity"))
    }
}

/// Resolve a `content-encoding` header to its codec pair
///
/// Returns [`Error::UnsupportedEncoding`] for labels the pipeline cannot
/// decode. That is a signal for the caller, not a failure of the response.
pub fn resolve(value: Option<&HeaderValue>, config: &CompressionConfig) -> Result<Codec> {
    let encoding = ContentEncoding::from_header(value);
    if !encoding.is_supported() {
        return Err(Error::UnsupportedEncoding(encoding.to_string()));
    }
    Ok(Codec::new(encoding, config.level))
}
