//! Push adapter: response sinks and write-path interception

use crate::observer::{ErrorObserver, Observed};
use crate::pipeline::ResponsePipeline;
use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::{stream, SinkExt, StreamExt};
use refract_core::{ByteStream, Error, RequestHead, ResponseHead, Result};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

/// Destination of a response body: the downstream connection or a stage feeding it
#[async_trait]
pub trait ResponseSink: Send {
    /// Write one chunk, waiting while the destination is busy
    async fn write(&mut self, chunk: Bytes) -> Result<()>;

    /// Signal end of body
    async fn end(&mut self) -> Result<()>;
}

#[async_trait]
impl<S: ResponseSink + ?Sized> ResponseSink for Box<S> {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        (**self).write(chunk).await
    }

    async fn end(&mut self) -> Result<()> {
        (**self).end().await
    }
}

/// Sink writing the body to an [`AsyncWrite`]
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> ResponseSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.writer
            .write_all(&chunk)
            .await
            .map_err(|e| Error::Sink(Box::new(e)))
    }

    async fn end(&mut self) -> Result<()> {
        self.writer
            .shutdown()
            .await
            .map_err(|e| Error::Sink(Box::new(e)))
    }
}

enum Signal {
    Data(Bytes),
    End,
}

/// Write side of a rewritten response
///
/// Chunks go through a bounded channel to a task that drives the chain into
/// the original sink. Dropping a `ChainSink` before [`end`](ResponseSink::end)
/// aborts the response: the chain sees [`Error::Aborted`] and the original
/// sink never receives `end`.
pub struct ChainSink {
    tx: Option<mpsc::Sender<Signal>>,
    driver: Option<JoinHandle<Result<()>>>,
    observer: Arc<dyn ErrorObserver>,
    request: RequestHead,
}

impl ChainSink {
    fn spawn<S>(
        output: impl FnOnce(ByteStream) -> ByteStream,
        sink: S,
        capacity: usize,
        observer: Arc<dyn ErrorObserver>,
        request: RequestHead,
    ) -> Self
    where
        S: ResponseSink + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity);

        let input = stream::unfold(Some(rx), |rx| async move {
            let mut rx = rx?;
            match rx.next().await {
                Some(Signal::Data(chunk)) => Some((Ok(chunk), Some(rx))),
                Some(Signal::End) => None,
                None => Some((Err(Error::Aborted), None)),
            }
        })
        .boxed();

        let chained = Observed::new(output(input), Arc::clone(&observer), request.clone());
        let driver = tokio::spawn(drive(chained, sink, Arc::clone(&observer), request.clone()));

        Self {
            tx: Some(tx),
            driver: Some(driver),
            observer,
            request,
        }
    }

    /// Whether `end` has been called
    pub fn is_ended(&self) -> bool {
        self.tx.is_none()
    }
}

/// Pull the chain output into `sink`, ending it exactly once on success
async fn drive<S>(
    mut output: Observed,
    mut sink: S,
    observer: Arc<dyn ErrorObserver>,
    request: RequestHead,
) -> Result<()>
where
    S: ResponseSink,
{
    while let Some(chunk) = output.next().await {
        // Stage errors were already reported by `Observed`.
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        if let Err(error) = sink.write(chunk).await {
            let error = as_sink_error(error);
            observer.report(&error, &request);
            return Err(error);
        }
    }

    sink.end().await.map_err(|error| {
        let error = as_sink_error(error);
        observer.report(&error, &request);
        error
    })
}

fn as_sink_error(error: Error) -> Error {
    match error {
        Error::Sink(_) => error,
        other => Error::Sink(Box::new(other)),
    }
}

impl ChainSink {
    async fn join_driver(&mut self) -> Result<()> {
        let driver = self.driver.take().ok_or(Error::ChainClosed)?;
        match driver.await {
            Ok(result) => result,
            Err(join_error) => {
                let error = Error::transform("chain", join_error);
                self.observer.report(&error, &self.request);
                Err(error)
            }
        }
    }
}

#[async_trait]
impl ResponseSink for ChainSink {
    /// Queue a chunk for the chain
    ///
    /// Once the chain has failed, the first rejected write returns the
    /// chain's error and later calls return [`Error::ChainClosed`].
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        let tx = self.tx.as_mut().ok_or(Error::ChainClosed)?;
        if tx.send(Signal::Data(chunk)).await.is_ok() {
            return Ok(());
        }

        self.tx = None;
        self.join_driver().await.and(Err(Error::ChainClosed))
    }

    /// Signal end of input and wait until the chain drained into the original sink
    ///
    /// Returns the chain's error, if any; it has already been reported.
    async fn end(&mut self) -> Result<()> {
        let mut tx = self.tx.take().ok_or(Error::ChainClosed)?;
        // A closed channel means the driver already stopped; its result says why.
        let _ = tx.send(Signal::End).await;
        drop(tx);

        self.join_driver().await
    }
}

impl fmt::Debug for ChainSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainSink")
            .field("path", &self.request.path())
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// The sink a proxy writes a response body to after interception
#[derive(Debug)]
pub enum Interception<S> {
    /// No rewriting; the original sink, untouched
    PassThrough(S),
    /// Body flows through a chain before reaching the original sink
    Rewritten(ChainSink),
}

impl<S> Interception<S> {
    /// Whether the body is being rewritten
    pub fn is_rewritten(&self) -> bool {
        matches!(self, Self::Rewritten(_))
    }
}

#[async_trait]
impl<S: ResponseSink> ResponseSink for Interception<S> {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        match self {
            Self::PassThrough(sink) => sink.write(chunk).await,
            Self::Rewritten(sink) => sink.write(chunk).await,
        }
    }

    async fn end(&mut self) -> Result<()> {
        match self {
            Self::PassThrough(sink) => sink.end().await,
            Self::Rewritten(sink) => sink.end().await,
        }
    }
}

impl ResponsePipeline {
    /// Interpose the pipeline between a response and its original sink
    ///
    /// Must be called from within a tokio runtime when the response is
    /// rewritten, since the chain is driven by a spawned task.
    pub fn intercept<S>(
        &self,
        response: &ResponseHead,
        request: &RequestHead,
        sink: S,
    ) -> Interception<S>
    where
        S: ResponseSink + 'static,
    {
        match self.plan(response, request) {
            None => Interception::PassThrough(sink),
            Some(chain) => Interception::Rewritten(ChainSink::spawn(
                move |input| chain.pipe(input),
                sink,
                self.config().channel_capacity,
                Arc::clone(self.observer()),
                request.clone(),
            )),
        }
    }
}
