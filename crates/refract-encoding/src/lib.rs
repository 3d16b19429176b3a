//! Content-encoding resolution for Refract
//!
//! Maps a `content-encoding` label to a matched pair of streaming
//! decompression/compression stages:
//! - gzip
//! - deflate (zlib-wrapped, as HTTP defines it)
//! - identity (absent or empty header; no stages at all)
//!
//! Anything else resolves to [`refract_core::Error::UnsupportedEncoding`],
//! which callers treat as "pass the response through untouched".

#![forbid(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod codec;
pub mod config;
pub mod encoding;

pub use codec::{Codec, FlateStream};
pub use config::CompressionConfig;
pub use encoding::{resolve, ContentEncoding};
