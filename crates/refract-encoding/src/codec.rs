//! Streaming decompression and compression stages

use crate::encoding::ContentEncoding;
use bytes::Bytes;
use flate2::write::{GzEncoder, MultiGzDecoder, ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use futures::{Stream, StreamExt};
use pin_project::pin_project;
use refract_core::{ByteStream, Error, Result};
use std::fmt;
use std::io::{self, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Matched decoder/encoder pair for one content-encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    encoding: ContentEncoding,
    level: u32,
}

impl Codec {
    /// Create a codec for a supported encoding
    pub fn new(encoding: ContentEncoding, level: u32) -> Self {
        Self {
            encoding,
            level: level.min(9),
        }
    }

    /// The encoding this codec handles
    pub fn encoding(&self) -> &ContentEncoding {
        &self.encoding
    }

    /// Whether both stages are pass-through
    pub fn is_identity(&self) -> bool {
        !matches!(self.encoding, ContentEncoding::Gzip | ContentEncoding::Deflate)
    }

    /// Names of the decoder and encoder stages, `None` for identity
    pub fn stage_names(&self) -> Option<(String, String)> {
        if self.is_identity() {
            return None;
        }
        Some((
            format!("{}-decoder", self.encoding),
            format!("{}-encoder", self.encoding),
        ))
    }

    /// Wrap `input` in the decompression stage
    pub fn decoder(&self, input: ByteStream) -> ByteStream {
        match self.encoding {
            ContentEncoding::Gzip => FlateStream::gzip_decoder(input).boxed(),
            ContentEncoding::Deflate => FlateStream::deflate_decoder(input).boxed(),
            _ => input,
        }
    }

    /// Wrap `input` in the compression stage
    pub fn encoder(&self, input: ByteStream) -> ByteStream {
        let level = Compression::new(self.level);
        match self.encoding {
            ContentEncoding::Gzip => FlateStream::gzip_encoder(input, level).boxed(),
            ContentEncoding::Deflate => FlateStream::deflate_encoder(input, level).boxed(),
            _ => input,
        }
    }
}

enum Coder {
    GzipDecoder(MultiGzDecoder<Vec<u8>>),
    DeflateDecoder(ZlibDecoder<Vec<u8>>),
    GzipEncoder(GzEncoder<Vec<u8>>),
    DeflateEncoder(ZlibEncoder<Vec<u8>>),
}

impl Coder {
    // Flushed per chunk so output follows input.
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self {
            Coder::GzipDecoder(c) => c.write_all(chunk).and_then(|_| c.flush()),
            Coder::DeflateDecoder(c) => c.write_all(chunk).and_then(|_| c.flush()),
            Coder::GzipEncoder(c) => c.write_all(chunk).and_then(|_| c.flush()),
            Coder::DeflateEncoder(c) => c.write_all(chunk).and_then(|_| c.flush()),
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        match self {
            Coder::GzipDecoder(c) => c.try_finish(),
            Coder::DeflateDecoder(c) => c.try_finish(),
            Coder::GzipEncoder(c) => c.try_finish(),
            Coder::DeflateEncoder(c) => c.try_finish(),
        }
    }

    fn take_output(&mut self) -> Vec<u8> {
        let out = match self {
            Coder::GzipDecoder(c) => c.get_mut(),
            Coder::DeflateDecoder(c) => c.get_mut(),
            Coder::GzipEncoder(c) => c.get_mut(),
            Coder::DeflateEncoder(c) => c.get_mut(),
        };
        std::mem::take(out)
    }

    fn name(&self) -> &'static str {
        match self {
            Coder::GzipDecoder(_) => "gzip-decoder",
            Coder::DeflateDecoder(_) => "deflate-decoder",
            Coder::GzipEncoder(_) => "gzip-encoder",
            Coder::DeflateEncoder(_) => "deflate-encoder",
        }
    }
}

/// Stream adapter running every chunk of an inner stream through a flate coder
///
/// Output is emitted as soon as the coder produces it. When the inner stream
/// ends the coder is finished and its trailer flushed. Errors from the inner
/// stream are forwarded and end this stream.
#[pin_project]
pub struct FlateStream<S> {
    #[pin]
    inner: S,
    coder: Coder,
    done: bool,
}

impl<S> FlateStream<S> {
    fn new(inner: S, coder: Coder) -> Self {
        Self {
            inner,
            coder,
            done: false,
        }
    }

    /// gzip decompression stage, decoding every member of the body
    pub fn gzip_decoder(inner: S) -> Self {
        Self::new(inner, Coder::GzipDecoder(MultiGzDecoder::new(Vec::new())))
    }

    /// zlib-wrapped inflate stage
    pub fn deflate_decoder(inner: S) -> Self {
        Self::new(inner, Coder::DeflateDecoder(ZlibDecoder::new(Vec::new())))
    }

    /// gzip compression stage
    pub fn gzip_encoder(inner: S, level: Compression) -> Self {
        Self::new(inner, Coder::GzipEncoder(GzEncoder::new(Vec::new(), level)))
    }

    /// zlib-wrapped deflate stage
    pub fn deflate_encoder(inner: S, level: Compression) -> Self {
        Self::new(inner, Coder::DeflateEncoder(ZlibEncoder::new(Vec::new(), level)))
    }
}

impl<S> Stream for FlateStream<S>
where
    S: Stream<Item = Result<Bytes>>,
{
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            let out = this.coder.take_output();
            if !out.is_empty() {
                return Poll::Ready(Some(Ok(Bytes::from(out))));
            }

            if *this.done {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    if let Err(e) = this.coder.write_chunk(&chunk) {
                        *this.done = true;
                        this.coder.take_output();
                        tracing::debug!(stage = this.coder.name(), error = %e, "codec failed");
                        return Poll::Ready(Some(Err(Error::Codec(e))));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.done = true;
                    // Anything still buffered belongs to a body that will never complete.
                    this.coder.take_output();
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    *this.done = true;
                    if let Err(e) = this.coder.finish() {
                        this.coder.take_output();
                        return Poll::Ready(Some(Err(Error::Codec(e))));
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S> fmt::Debug for FlateStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlateStream")
            .field("coder", &self.coder.name())
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::{GzDecoder as ReadGzDecoder, ZlibDecoder as ReadZlibDecoder};
    use refract_core::stream::{collect, from_chunks};
    use std::io::Read;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn split(data: &[u8], size: usize) -> Vec<Bytes> {
        data.chunks(size).map(Bytes::copy_from_slice).collect()
    }

    #[tokio::test]
    async fn test_gzip_decoder_across_chunks() {
        let body = "Hello, World! This is a test string that should compress well. ".repeat(50);
        let compressed = gzip(body.as_bytes());

        let codec = Codec::new(ContentEncoding::Gzip, 6);
        let decoded = collect(codec.decoder(from_chunks(split(&compressed, 7))))
            .await
            .unwrap();
        assert_eq!(decoded, body.as_bytes());
    }

    #[tokio::test]
    async fn test_gzip_encoder_output_is_valid_gzip() {
        let body = "{\"name\":\"x\",\"age\":2}";
        let codec = Codec::new(ContentEncoding::Gzip, 6);
        let encoded = collect(codec.encoder(from_chunks(split(body.as_bytes(), 4))))
            .await
            .unwrap();

        let mut decoded = String::new();
        ReadGzDecoder::new(&encoded[..])
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, body);
    }

    #[tokio::test]
    async fn test_deflate_encoder_is_zlib_wrapped() {
        let body = b"deflate body, deflate body, deflate body";
        let codec = Codec::new(ContentEncoding::Deflate, 9);
        let encoded = collect(codec.encoder(from_chunks(vec![Bytes::from_static(body)])))
            .await
            .unwrap();

        let mut decoded = Vec::new();
        ReadZlibDecoder::new(&encoded[..])
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, body);

        let again = collect(codec.decoder(from_chunks(split(&encoded, 3))))
            .await
            .unwrap();
        assert_eq!(again, &body[..]);
    }

    #[tokio::test]
    async fn test_identity_is_passthrough() {
        let codec = Codec::new(ContentEncoding::Identity, 6);
        assert!(codec.is_identity());

        let out = collect(codec.encoder(codec.decoder(from_chunks(vec![
            Bytes::from_static(b"raw "),
            Bytes::from_static(b"bytes"),
        ]))))
        .await
        .unwrap();
        assert_eq!(out, Bytes::from_static(b"raw bytes"));
    }

    #[tokio::test]
    async fn test_corrupt_input_is_codec_error() {
        let codec = Codec::new(ContentEncoding::Gzip, 6);
        let result = collect(codec.decoder(from_chunks(vec![Bytes::from_static(
            b"definitely not gzip data",
        )])))
        .await;
        assert!(matches!(result, Err(Error::Codec(_))));
    }

    #[tokio::test]
    async fn test_inner_error_is_forwarded() {
        let input = futures::stream::iter(vec![
            Ok(Bytes::from(gzip(b"partial"))),
            Err(Error::Aborted),
        ])
        .boxed();
        let codec = Codec::new(ContentEncoding::Gzip, 6);
        let mut out = codec.decoder(input);

        let mut saw_error = false;
        while let Some(item) = out.next().await {
            if let Err(e) = item {
                assert!(matches!(e, Error::Aborted));
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_gzip_decoder_reads_every_member() {
        let mut body = gzip(b"first member, ");
        body.extend_from_slice(&gzip(b"second member"));

        let codec = Codec::new(ContentEncoding::Gzip, 6);
        let decoded = collect(codec.decoder(from_chunks(split(&body, 5))))
            .await
            .unwrap();
        assert_eq!(decoded, Bytes::from_static(b"first member, second member"));
    }

    #[tokio::test]
    async fn test_nothing_follows_a_codec_error() {
        // Large enough that the decoder hands out output before reaching the checksum.
        let mut body = zlib("a".repeat(256 * 1024).as_bytes());
        let last = body.len() - 1;
        body[last] ^= 0xff;

        let mut out = FlateStream::deflate_decoder(from_chunks(vec![Bytes::from(body)]));

        let mut saw_error = false;
        while let Some(item) = out.next().await {
            if item.is_err() {
                saw_error = true;
                break;
            }
        }
        assert!(saw_error);
        assert!(out.next().await.is_none());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Codec::new(ContentEncoding::Identity, 6).stage_names(), None);
        assert_eq!(
            Codec::new(ContentEncoding::Deflate, 6).stage_names(),
            Some(("deflate-decoder".to_string(), "deflate-encoder".to_string()))
        );
    }
}
