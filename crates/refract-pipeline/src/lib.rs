//! # Refract Pipeline
//!
//! Streaming response-body rewriting for HTTP proxies.
//!
//! A [`ResponsePipeline`] holds an ordered list of [`Matcher`]s. For every
//! proxied response it resolves the body's content-encoding, selects the
//! matchers whose condition holds, and interposes a [`Chain`]:
//!
//! ```text
//! decoder -> stream transforms -> body reduction -> encoder
//! ```
//!
//! Two adapters wire the chain into a proxy:
//! - [`ResponsePipeline::intercept`] swaps the proxy's [`ResponseSink`] for a
//!   [`ChainSink`] (push style)
//! - [`ResponsePipeline::transform_response`] replaces an `http::Response`
//!   body with a [`PipelineBody`] (pull style, for hyper)
//!
//! ## Example
//!
//! ```
//! use refract_pipeline::{Matcher, ResponsePipeline};
//!
//! let pipeline = ResponsePipeline::builder()
//!     .matcher(
//!         Matcher::new()
//!             .with_name("redact")
//!             .when(|_res, req| req.path() == "/users")
//!             .with_body_transform(|body| Ok(body.replace("secret", "******"))),
//!     )
//!     .build()
//!     .unwrap();
//! # let _ = pipeline;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod body;
pub mod chain;
pub mod matcher;
pub mod observer;
pub mod pipeline;
pub mod reducer;
pub mod rules;
pub mod sink;
pub mod transform;

pub use body::PipelineBody;
pub use chain::Chain;
pub use matcher::{Condition, Matcher};
pub use observer::{ErrorObserver, TracingObserver};
pub use pipeline::{PipelineBuilder, ResponsePipeline};
pub use reducer::BodyReduction;
pub use rules::apply_json;
pub use sink::{ChainSink, Interception, ResponseSink, WriterSink};
pub use transform::{BodyFn, BodyTransform, ChunkFn, ChunkTransform, ReplaceText, StreamTransform};

pub use refract_config::{PipelineConfig, RulesFile};
pub use refract_core::{Error, ErrorKind, RequestHead, ResponseHead, Result};
pub use refract_encoding::ContentEncoding;
