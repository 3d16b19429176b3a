//! Response pipeline and its builder

use crate::chain::Chain;
use crate::matcher::Matcher;
use crate::observer::{ErrorObserver, TracingObserver};
use crate::reducer::BodyReduction;
use crate::transform::BodyTransform;
use http::{Method, StatusCode};
use refract_config::PipelineConfig;
use refract_core::{Error, RequestHead, ResponseHead, Result};
use std::fmt;
use std::sync::Arc;

/// Rewrites proxied response bodies according to an ordered matcher list
///
/// Cheap to clone; every clone shares the same read-only matchers, observer
/// and configuration.
#[derive(Clone)]
pub struct ResponsePipeline {
    inner: Arc<Inner>,
}

struct Inner {
    matchers: Vec<(String, Matcher)>,
    observer: Arc<dyn ErrorObserver>,
    config: PipelineConfig,
}

impl ResponsePipeline {
    /// Start building a pipeline
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Build a pipeline with the default observer and configuration
    pub fn new(matchers: impl IntoIterator<Item = Matcher>) -> Result<Self> {
        PipelineBuilder::new().matchers(matchers).build()
    }

    /// Number of registered matchers
    pub fn matcher_count(&self) -> usize {
        self.inner.matchers.len()
    }

    /// Pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub(crate) fn observer(&self) -> &Arc<dyn ErrorObserver> {
        &self.inner.observer
    }

    /// Decide how the response to `request` is handled
    ///
    /// Returns `None` when the body must pass through untouched: the response
    /// cannot carry a body, its encoding is unsupported (reported to the
    /// observer), or no matcher applies. Otherwise returns the chain its body
    /// must flow through.
    pub fn plan(&self, response: &ResponseHead, request: &RequestHead) -> Option<Chain> {
        if !carries_body(response.status, &request.method) {
            tracing::trace!(status = %response.status, "Response has no body, passing through");
            return None;
        }

        let codec = match refract_encoding::resolve(
            response.content_encoding(),
            &self.inner.config.compression,
        ) {
            Ok(codec) => codec,
            Err(error) => {
                self.inner.observer.report(&error, request);
                return None;
            }
        };

        let active: Vec<&(String, Matcher)> = self
            .inner
            .matchers
            .iter()
            .filter(|(_, matcher)| matcher.applies(response, request))
            .collect();

        if active.is_empty() {
            tracing::trace!(path = request.path(), "No matcher applies, passing through");
            return None;
        }

        let stream_transforms = active
            .iter()
            .filter_map(|(_, m)| m.stream_transform().cloned())
            .collect();
        let body_transforms: Vec<BodyTransform> = active
            .iter()
            .filter_map(|(label, m)| {
                m.body_transform()
                    .map(|func| BodyTransform::new(label.clone(), Arc::clone(func)))
            })
            .collect();
        let reduction = BodyReduction::new(body_transforms, self.inner.config.max_body_size);
        let names = active.iter().map(|(label, _)| label.clone()).collect();

        let chain = Chain::new(codec, stream_transforms, Some(reduction), names);

        tracing::debug!(
            path = request.path(),
            encoding = %chain.encoding(),
            matchers = ?chain.matchers(),
            stages = ?chain.stage_names(),
            "Rewriting response body"
        );

        Some(chain)
    }
}

/// Statuses and methods for which the response has no body on the wire
fn carries_body(status: StatusCode, method: &Method) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
        || method == Method::HEAD)
}

impl fmt::Debug for ResponsePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponsePipeline")
            .field("matchers", &self.inner.matchers.len())
            .field("observer", &self.inner.observer)
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Response pipeline builder
///
/// Matchers are validated once, in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    matchers: Vec<Matcher>,
    observer: Option<Arc<dyn ErrorObserver>>,
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a matcher
    #[must_use]
    pub fn matcher(mut self, matcher: Matcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Append several matchers, keeping their order
    #[must_use]
    pub fn matchers(mut self, matchers: impl IntoIterator<Item = Matcher>) -> Self {
        self.matchers.extend(matchers);
        self
    }

    /// Report per-response errors to `observer` instead of the tracing log
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn ErrorObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replace the pipeline configuration
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Cap the body-reduction buffer
    #[must_use]
    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.config.max_body_size = Some(limit);
        self
    }

    /// Validate the matchers and build the pipeline
    ///
    /// Fails with [`Error::Configuration`] naming the first matcher that has
    /// neither a stream nor a body transform.
    pub fn build(self) -> Result<ResponsePipeline> {
        if self.config.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be > 0".to_string()));
        }

        let mut matchers = Vec::with_capacity(self.matchers.len());
        for (index, matcher) in self.matchers.into_iter().enumerate() {
            let label = matcher.label(index);
            if !matcher.has_transform() {
                return Err(Error::configuration(
                    label,
                    "matcher needs a stream transform or a body transform",
                ));
            }
            matchers.push((label, matcher));
        }

        tracing::debug!(matchers = matchers.len(), "Response pipeline built");

        Ok(ResponsePipeline {
            inner: Arc::new(Inner {
                matchers,
                observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
                config: self.config,
            }),
        })
    }
}
