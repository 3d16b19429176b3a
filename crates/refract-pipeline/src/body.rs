//! Pull adapter for `http_body::Body` based proxies

use crate::observer::Observed;
use crate::pipeline::ResponsePipeline;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use http::header::CONTENT_LENGTH;
use http::Response;
use http_body::{Body, Frame};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, StreamBody};
use refract_core::{BoxError, Error, RequestHead, ResponseHead};
use std::sync::Arc;

/// Body of a response returned by [`ResponsePipeline::transform_response`]
pub type PipelineBody = UnsyncBoxBody<Bytes, Error>;

impl ResponsePipeline {
    /// Rewrite a response whose body is polled by the HTTP server
    ///
    /// Untouched responses keep their body verbatim. Rewritten ones lose their
    /// `content-length`; `content-encoding` is kept since the body is
    /// re-encoded with the encoding it arrived in.
    pub fn transform_response<B>(
        &self,
        response: Response<B>,
        request: &RequestHead,
    ) -> Response<PipelineBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let head = ResponseHead::from(&response);
        let (mut parts, body) = response.into_parts();

        let Some(chain) = self.plan(&head, request) else {
            let body = BodyExt::map_err(body, |e| Error::Upstream(e.into())).boxed_unsync();
            return Response::from_parts(parts, body);
        };

        parts.headers.remove(CONTENT_LENGTH);

        let input = body
            .into_data_stream()
            .map_err(|e| Error::Upstream(e.into()))
            .boxed();
        let output = Observed::new(
            chain.pipe(input),
            Arc::clone(self.observer()),
            request.clone(),
        );

        let body = StreamBody::new(output.map_ok(Frame::data)).boxed_unsync();
        Response::from_parts(parts, body)
    }
}
