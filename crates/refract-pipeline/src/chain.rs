//! Per-response stream chain

use crate::reducer::BodyReduction;
use crate::transform::StreamTransform;
use refract_core::ByteStream;
use refract_encoding::{Codec, ContentEncoding};
use std::fmt;
use std::sync::Arc;

/// The stages planned for one response
///
/// `decoder → stream transforms → body reduction → encoder`, where the codec
/// stages are omitted for identity bodies and the reduction is omitted when no
/// active matcher has a body transform.
#[derive(Clone)]
pub struct Chain {
    codec: Codec,
    stream_transforms: Vec<Arc<dyn StreamTransform>>,
    reduction: Option<BodyReduction>,
    matchers: Vec<String>,
}

impl Chain {
    pub(crate) fn new(
        codec: Codec,
        stream_transforms: Vec<Arc<dyn StreamTransform>>,
        reduction: Option<BodyReduction>,
        matchers: Vec<String>,
    ) -> Self {
        Self {
            codec,
            stream_transforms,
            reduction: reduction.filter(|r| !r.is_empty()),
            matchers,
        }
    }

    /// Encoding the chain decodes and re-encodes
    pub fn encoding(&self) -> &ContentEncoding {
        self.codec.encoding()
    }

    /// Names of the matchers that contributed stages, in order
    pub fn matchers(&self) -> &[String] {
        &self.matchers
    }

    /// Number of streaming transform stages
    pub fn stream_stage_count(&self) -> usize {
        self.stream_transforms.len()
    }

    /// Whether the chain buffers the body for whole-body transforms
    pub fn has_reduction(&self) -> bool {
        self.reduction.is_some()
    }

    /// Name every stage in the order data flows through them
    pub fn stage_names(&self) -> Vec<String> {
        let codec = self.codec.stage_names();
        let mut names = Vec::new();

        if let Some((decoder, _)) = &codec {
            names.push(decoder.clone());
        }
        names.extend(self.stream_transforms.iter().map(|t| t.name().to_string()));
        if let Some(reduction) = &self.reduction {
            names.extend(reduction.names().map(str::to_string));
        }
        if let Some((_, encoder)) = codec {
            names.push(encoder);
        }

        names
    }

    /// Compose every stage around `input`
    ///
    /// Stages are lazy: nothing runs until the returned stream is polled, and
    /// each stage only pulls from its predecessor when polled itself.
    pub fn pipe(&self, input: ByteStream) -> ByteStream {
        let mut stream = self.codec.decoder(input);

        for transform in &self.stream_transforms {
            stream = transform.apply(stream);
        }

        if let Some(reduction) = &self.reduction {
            stream = reduction.apply(stream);
        }

        self.codec.encoder(stream)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("encoding", self.codec.encoding())
            .field("stream_transforms", &self.stream_transforms)
            .field("reduction", &self.reduction)
            .field("matchers", &self.matchers)
            .finish()
    }
}
