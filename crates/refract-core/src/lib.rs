//! # Refract Core
//!
//! Core types and error handling for the Refract response rewriting pipeline.
//!
//! This crate provides the foundational abstractions shared by every stage:
//! - Request/response heads seen by matcher conditions
//! - The [`ByteStream`] type stages consume and produce
//! - Error types

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod request;
pub mod response;
pub mod stream;

pub use error::{BoxError, Error, ErrorKind, Result};
pub use request::RequestHead;
pub use response::ResponseHead;
pub use stream::ByteStream;

// Re-export commonly used HTTP types
pub use bytes::Bytes;
pub use http::{HeaderMap, Method, StatusCode, Uri};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::request::RequestHead;
    pub use crate::response::ResponseHead;
    pub use crate::stream::ByteStream;
}
