//! Body-reduction stage
//!
//! Buffers the whole body, runs the whole-body transforms over it in order and
//! emits the result as a single chunk. The buffer is unbounded unless a limit
//! is configured; every rewritten body is held in memory until it ends.

use crate::transform::BodyTransform;
use bytes::Bytes;
use futures::{stream, StreamExt};
use refract_core::{ByteStream, Error, Result};
use std::sync::Arc;

/// Stage folding a whole-body transform list into the stream chain
#[derive(Debug, Clone)]
pub struct BodyReduction {
    transforms: Arc<[BodyTransform]>,
    limit: Option<usize>,
}

impl BodyReduction {
    /// Create a reduction over `transforms`, applied in order
    pub fn new(transforms: impl Into<Arc<[BodyTransform]>>, limit: Option<usize>) -> Self {
        Self {
            transforms: transforms.into(),
            limit,
        }
    }

    /// Number of body transforms
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Names of the body transforms, in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transforms.iter().map(BodyTransform::name)
    }

    /// Whether there is nothing to reduce
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Wrap `input` in the reduction stage
    ///
    /// If `input` yields an error the buffer is dropped untransformed and the
    /// error is forwarded.
    pub fn apply(&self, input: ByteStream) -> ByteStream {
        let reduction = self.clone();
        stream::once(async move { reduction.reduce(input).await }).boxed()
    }

    async fn reduce(&self, mut input: ByteStream) -> Result<Bytes> {
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = input.next().await {
            let chunk = chunk?;
            if let Some(limit) = self.limit {
                if buffer.len() + chunk.len() > limit {
                    return Err(Error::BodyTooLarge { limit });
                }
            }
            buffer.extend_from_slice(&chunk);
        }

        let mut body = match String::from_utf8(buffer) {
            Ok(body) => body,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };

        for transform in self.transforms.iter() {
            body = transform.apply(body)?;
        }

        tracing::trace!(
            transforms = self.transforms.len(),
            size = body.len(),
            "body reduced"
        );

        Ok(Bytes::from(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refract_core::stream::{collect, from_chunks};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn named<F>(name: &str, func: F) -> BodyTransform
    where
        F: Fn(String) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        BodyTransform::new(name, Arc::new(func))
    }

    #[tokio::test]
    async fn test_transforms_run_in_order() {
        let reduction = BodyReduction::new(
            vec![
                named("f", |body| Ok(format!("f({body})"))),
                named("g", |body| Ok(format!("g({body})"))),
            ],
            None,
        );

        let input = from_chunks(vec![Bytes::from_static(b"B"), Bytes::from_static(b"ody")]);
        let mut out = reduction.apply(input);

        assert_eq!(out.next().await.unwrap().unwrap(), Bytes::from_static(b"g(f(Body))"));
        assert!(out.next().await.is_none());
    }

    #[tokio::test]
    async fn test_failing_transform_is_transform_error() {
        let reduction = BodyReduction::new(
            vec![named("explode", |_body| anyhow::bail!("bad body"))],
            None,
        );

        let err = collect(reduction.apply(from_chunks(vec![Bytes::from_static(b"x")])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transform { ref stage, .. } if stage == "explode"));
    }

    #[tokio::test]
    async fn test_partial_body_is_never_transformed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let reduction = BodyReduction::new(
            vec![named("count", move |body| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(body)
            })],
            None,
        );

        let input = stream::iter(vec![Ok(Bytes::from_static(b"half")), Err(Error::Aborted)]).boxed();
        let err = collect(reduction.apply(input)).await.unwrap_err();

        assert!(matches!(err, Error::Aborted));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_limit() {
        let reduction = BodyReduction::new(vec![named("id", |body| Ok(body))], Some(4));

        let ok = collect(reduction.apply(from_chunks(vec![Bytes::from_static(b"four")]))).await;
        assert_eq!(ok.unwrap(), Bytes::from_static(b"four"));

        let err = collect(reduction.apply(from_chunks(vec![
            Bytes::from_static(b"fou"),
            Bytes::from_static(b"r+"),
        ])))
        .await
        .unwrap_err();
        assert!(matches!(err, Error::BodyTooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let reduction = BodyReduction::new(vec![named("id", |body| Ok(body))], None);
        let out = collect(reduction.apply(from_chunks(vec![Bytes::from_static(b"a\xffb")])))
            .await
            .unwrap();
        assert_eq!(out, "a\u{fffd}b".as_bytes());
    }
}
