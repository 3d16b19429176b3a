//! Matcher rules

use crate::transform::{BodyFn, ChunkTransform, StreamTransform};
use bytes::Bytes;
use refract_core::{RequestHead, ResponseHead};
use std::fmt;
use std::sync::Arc;

/// Predicate deciding whether a matcher applies to a response
pub type Condition = dyn Fn(&ResponseHead, &RequestHead) -> bool + Send + Sync;

/// A rewriting rule: an optional condition plus a stream and/or body transform
///
/// ```
/// use refract_pipeline::Matcher;
///
/// let matcher = Matcher::new()
///     .with_name("uppercase")
///     .when(|_res, req| req.path().starts_with("/api"))
///     .with_body_transform(|body| Ok(body.to_uppercase()));
/// assert!(matcher.has_transform());
/// ```
#[derive(Clone, Default)]
pub struct Matcher {
    name: Option<String>,
    condition: Option<Arc<Condition>>,
    stream_transform: Option<Arc<dyn StreamTransform>>,
    body_transform: Option<Arc<BodyFn>>,
}

impl Matcher {
    /// Create an empty matcher that applies to every response
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the matcher for logs and errors
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Only apply when `condition` holds
    #[must_use]
    pub fn when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&ResponseHead, &RequestHead) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Set the streaming transform
    #[must_use]
    pub fn with_stream_transform<T>(mut self, transform: T) -> Self
    where
        T: StreamTransform + 'static,
    {
        self.stream_transform = Some(Arc::new(transform));
        self
    }

    /// Set a per-chunk closure as the streaming transform
    #[must_use]
    pub fn with_chunk_fn<F>(self, func: F) -> Self
    where
        F: Fn(Bytes) -> anyhow::Result<Bytes> + Send + Sync + 'static,
    {
        let name = self.name.clone().unwrap_or_else(|| "chunk-fn".to_string());
        self.with_stream_transform(ChunkTransform::new(name, func))
    }

    /// Set the whole-body transform
    #[must_use]
    pub fn with_body_transform<F>(mut self, func: F) -> Self
    where
        F: Fn(String) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.body_transform = Some(Arc::new(func));
        self
    }

    /// Matcher name, if set
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for logs, falling back to the matcher's position
    pub fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("matcher #{index}"))
    }

    /// Whether at least one transform is set
    pub fn has_transform(&self) -> bool {
        self.stream_transform.is_some() || self.body_transform.is_some()
    }

    /// Whether the matcher applies to this response
    pub fn applies(&self, response: &ResponseHead, request: &RequestHead) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition(response, request))
    }

    pub(crate) fn stream_transform(&self) -> Option<&Arc<dyn StreamTransform>> {
        self.stream_transform.as_ref()
    }

    pub(crate) fn body_transform(&self) -> Option<&Arc<BodyFn>> {
        self.body_transform.as_ref()
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("name", &self.name)
            .field("condition", &self.condition.is_some())
            .field("stream_transform", &self.stream_transform)
            .field("body_transform", &self.body_transform.is_some())
            .finish()
    }
}
