//! Error types for the Refract pipeline

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used for foreign failures carried as sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the Refract pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Matcher rejected at registration time
    #[error("Invalid matcher '{matcher}': {reason}")]
    Configuration {
        /// Matcher name or position
        matcher: String,
        /// Why the matcher was rejected
        reason: String,
    },

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response declared a content-encoding the pipeline cannot rewrite
    #[error("Unsupported content-encoding: {0}")]
    UnsupportedEncoding(String),

    /// A stream or body transform failed
    #[error("Transform '{stage}' failed: {source}")]
    Transform {
        /// Stage that failed
        stage: String,
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// Body reduction buffer exceeded its configured limit
    #[error("Body exceeds buffer limit of {limit} bytes")]
    BodyTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// Decompression or compression failure
    #[error("Codec error: {0}")]
    Codec(#[source] std::io::Error),

    /// Upstream body failed while being read
    #[error("Upstream body error: {0}")]
    Upstream(#[source] BoxError),

    /// Downstream sink rejected a write or end
    #[error("Downstream sink error: {0}")]
    Sink(#[source] BoxError),

    /// Input stopped without an end signal
    #[error("Response aborted before end of body")]
    Aborted,

    /// The chain already terminated and accepts no more input
    #[error("Response chain is closed")]
    ChainClosed,
}

/// Coarse classification of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Setup-time failure; the pipeline is never built
    Configuration,
    /// Per-response, non-fatal; the response passes through untouched
    UnsupportedEncoding,
    /// A transform failed while running
    Transform,
    /// Stream I/O failed; the chain is terminated
    ChainIo,
}

impl Error {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration { .. } | Error::Config(_) => ErrorKind::Configuration,
            Error::UnsupportedEncoding(_) => ErrorKind::UnsupportedEncoding,
            Error::Transform { .. } | Error::BodyTooLarge { .. } => ErrorKind::Transform,
            Error::Codec(_)
            | Error::Upstream(_)
            | Error::Sink(_)
            | Error::Aborted
            | Error::ChainClosed => ErrorKind::ChainIo,
        }
    }

    /// Create a matcher configuration error
    pub fn configuration(matcher: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Configuration {
            matcher: matcher.into(),
            reason: reason.into(),
        }
    }

    /// Create a transform error
    pub fn transform(stage: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Transform {
            stage: stage.into(),
            source: source.into(),
        }
    }
}
