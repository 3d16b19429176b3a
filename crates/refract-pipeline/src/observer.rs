//! Per-response error reporting

use bytes::Bytes;
use futures::Stream;
use refract_core::{ByteStream, Error, ErrorKind, RequestHead, Result};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Receives every per-response error the pipeline encounters
///
/// Reports are informational: by the time `report` runs, the response has
/// already been passed through (unsupported encoding) or its chain has been
/// shut down.
pub trait ErrorObserver: Send + Sync + fmt::Debug {
    /// Report an error for the response to `request`
    fn report(&self, error: &Error, request: &RequestHead);
}

/// Default observer, logging through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ErrorObserver for TracingObserver {
    fn report(&self, error: &Error, request: &RequestHead) {
        let path = request.path();
        let method = request.method.as_str();

        match (error.kind(), error) {
            (ErrorKind::UnsupportedEncoding, _) => {
                tracing::warn!(%error, method, path, "Response passed through unmodified");
            }
            (_, Error::Aborted) => {
                tracing::debug!(method, path, "Response chain aborted");
            }
            (kind, _) => {
                tracing::error!(%error, ?kind, method, path, "Response chain failed");
            }
        }
    }
}

/// Stream wrapper reporting the first error to an observer and ending after it
pub(crate) struct Observed {
    inner: ByteStream,
    observer: Arc<dyn ErrorObserver>,
    request: RequestHead,
    terminated: bool,
}

impl Observed {
    pub(crate) fn new(
        inner: ByteStream,
        observer: Arc<dyn ErrorObserver>,
        request: RequestHead,
    ) -> Self {
        Self {
            inner,
            observer,
            request,
            terminated: false,
        }
    }
}

impl Stream for Observed {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }

        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Err(error))) => {
                self.terminated = true;
                self.observer.report(&error, &self.request);
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                self.terminated = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("path", &self.request.path())
            .field("terminated", &self.terminated)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ErrorObserver for Recorder {
        fn report(&self, error: &Error, _request: &RequestHead) {
            self.0.lock().unwrap().push(error.to_string());
        }
    }

    #[tokio::test]
    async fn test_reports_first_error_once_and_ends() {
        let recorder = Arc::new(Recorder::default());
        let inner = stream::iter(vec![
            Ok(Bytes::from_static(b"a")),
            Err(Error::Aborted),
            Ok(Bytes::from_static(b"late")),
            Err(Error::ChainClosed),
        ])
        .boxed();

        let items: Vec<_> = Observed::new(inner, recorder.clone(), RequestHead::default())
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::Aborted)));
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_tracing_observer_handles_every_kind() {
        let observer = TracingObserver;
        let request = RequestHead::default();
        observer.report(&Error::UnsupportedEncoding("br".to_string()), &request);
        observer.report(&Error::Aborted, &request);
        observer.report(&Error::BodyTooLarge { limit: 1 }, &request);
    }
}
