//! Byte streams flowing between chain stages

use crate::Result;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};

/// A boxed stream of body chunks
///
/// Every chain stage consumes one and produces one. An `Err` item is terminal:
/// stages forward it and stop.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Build a stream that yields the given chunks in order
pub fn from_chunks<I>(chunks: I) -> ByteStream
where
    I: IntoIterator<Item = Bytes>,
    I::IntoIter: Send + 'static,
{
    stream::iter(chunks.into_iter().map(Ok)).boxed()
}

/// Drain a stream into one contiguous buffer, stopping at the first error
pub async fn collect(mut stream: ByteStream) -> Result<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}
