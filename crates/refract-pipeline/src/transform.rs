//! Stream and whole-body transforms

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use memchr::memmem::Finder;
use refract_core::{ByteStream, Error};
use std::fmt;
use std::sync::Arc;

/// A streaming stage rewriting body chunks as they pass
///
/// `apply` is called once per rewritten response with the output of the
/// previous stage and must return a fresh stream for that response. The
/// returned stream may split or merge chunks but must keep byte order, must
/// end when its input ends, and must forward input errors.
pub trait StreamTransform: Send + Sync + fmt::Debug {
    /// Name used in logs and errors
    fn name(&self) -> &str {
        "stream-transform"
    }

    /// Wrap `input` in this stage
    fn apply(&self, input: ByteStream) -> ByteStream;
}

/// Signature of a whole-body transform
pub type BodyFn = dyn Fn(String) -> anyhow::Result<String> + Send + Sync;

/// Signature of a per-chunk transform
pub type ChunkFn = dyn Fn(Bytes) -> anyhow::Result<Bytes> + Send + Sync;

/// A whole-body transform together with the name errors are reported under
#[derive(Clone)]
pub struct BodyTransform {
    name: String,
    func: Arc<BodyFn>,
}

impl BodyTransform {
    /// Create a named body transform
    pub fn new(name: impl Into<String>, func: Arc<BodyFn>) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    /// Transform name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the transform, converting failures into [`Error::Transform`]
    pub fn apply(&self, body: String) -> refract_core::Result<String> {
        (self.func)(body).map_err(|e| Error::transform(self.name.clone(), e))
    }
}

impl fmt::Debug for BodyTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyTransform")
            .field("name", &self.name)
            .finish()
    }
}

/// Stream transform mapping every chunk through a closure
#[derive(Clone)]
pub struct ChunkTransform {
    name: String,
    func: Arc<ChunkFn>,
}

impl ChunkTransform {
    /// Create a named per-chunk transform
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Bytes) -> anyhow::Result<Bytes> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for ChunkTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkTransform")
            .field("name", &self.name)
            .finish()
    }
}

impl StreamTransform for ChunkTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, input: ByteStream) -> ByteStream {
        let func = Arc::clone(&self.func);
        let name = self.name.clone();
        input
            .and_then(move |chunk| {
                let result = func(chunk).map_err(|e| Error::transform(name.clone(), e));
                futures::future::ready(result)
            })
            .boxed()
    }
}

/// Literal byte replacements applied to each chunk independently
///
/// A needle that straddles a chunk boundary is not replaced.
#[derive(Debug, Clone)]
pub struct ReplaceText {
    name: String,
    replacements: Arc<[(Finder<'static>, Vec<u8>)]>,
}

impl ReplaceText {
    /// Create from `(from, to)` pairs, applied in order
    pub fn new<I, F, T>(name: impl Into<String>, replacements: I) -> Self
    where
        I: IntoIterator<Item = (F, T)>,
        F: Into<Vec<u8>>,
        T: Into<Vec<u8>>,
    {
        Self {
            name: name.into(),
            replacements: replacements
                .into_iter()
                .map(|(from, to)| (from.into(), to.into()))
                .filter(|(from, _): &(Vec<u8>, Vec<u8>)| !from.is_empty())
                .map(|(from, to)| (Finder::new(&from).into_owned(), to))
                .collect(),
        }
    }
}

impl StreamTransform for ReplaceText {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, input: ByteStream) -> ByteStream {
        let replacements = Arc::clone(&self.replacements);
        input
            .map_ok(move |chunk| {
                replacements.iter().fold(chunk, |chunk, (finder, to)| {
                    match replace_bytes(&chunk, finder, to) {
                        Some(replaced) => Bytes::from(replaced),
                        None => chunk,
                    }
                })
            })
            .boxed()
    }
}

/// Replace every occurrence `finder` locates; `None` when there was nothing to replace
fn replace_bytes(haystack: &[u8], finder: &Finder<'_>, to: &[u8]) -> Option<Vec<u8>> {
    let mut matches = finder.find_iter(haystack).peekable();
    matches.peek()?;

    let needle = finder.needle().len();
    let mut out = Vec::with_capacity(haystack.len());
    let mut start = 0;
    for pos in matches {
        out.extend_from_slice(&haystack[start..pos]);
        out.extend_from_slice(to);
        start = pos + needle;
    }
    out.extend_from_slice(&haystack[start..]);
    Some(out)
}
