//! End-to-end: client -> hyper proxy (pull adapter) -> hyper target

mod common;

use bytes::Bytes;
use common::{gunzip, gzip};
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use http::{Request, Response};
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use refract_pipeline::{Error, Matcher, RequestHead, ResponsePipeline};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;

const ORIGINAL: &str = r#"{"name":"node-http-proxy-json","age":1,"version":"1.0.0"}"#;
const EXPECTED: &str = r#"{"name":"node-http-proxy-json","age":2}"#;

async fn start_target() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let service = service_fn(|_req: Request<Incoming>| async {
                let response = Response::builder()
                    .header(CONTENT_TYPE, "application/json")
                    .header(CONTENT_ENCODING, "gzip")
                    .body(Full::new(Bytes::from(gzip(ORIGINAL.as_bytes()))))
                    .unwrap();
                Ok::<_, Infallible>(response)
            });
            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

async fn start_proxy(target: SocketAddr, pipeline: ResponsePipeline) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = Client::builder(TokioExecutor::new()).build_http::<Empty<Bytes>>();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let pipeline = pipeline.clone();
            let client = client.clone();

            let service = service_fn(move |req: Request<Incoming>| {
                let pipeline = pipeline.clone();
                let client = client.clone();
                async move {
                    let head = RequestHead::from(&req);
                    let upstream = Request::builder()
                        .method(req.method().clone())
                        .uri(format!("http://{target}{}", req.uri().path()))
                        .body(Empty::<Bytes>::new())
                        .unwrap();
                    let response = client
                        .request(upstream)
                        .await
                        .map_err(|e| Error::Upstream(Box::new(e)))?;
                    Ok::<_, Error>(pipeline.transform_response(response, &head))
                }
            });

            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

async fn get(addr: SocketAddr, path: &str) -> Response<Bytes> {
    let client = Client::builder(TokioExecutor::new()).build_http::<Empty<Bytes>>();
    let response = client
        .get(format!("http://{addr}{path}").parse().unwrap())
        .await
        .unwrap();

    let (parts, body) = response.into_parts();
    let body = body.collect().await.unwrap().to_bytes();
    Response::from_parts(parts, body)
}

fn pipeline() -> ResponsePipeline {
    ResponsePipeline::new(vec![Matcher::new()
        .with_name("bump-age")
        .when(|_, req| req.path().starts_with("/api"))
        .with_body_transform(|body| {
            let mut value: serde_json::Value = serde_json::from_str(&body)?;
            if let Some(object) = value.as_object_mut() {
                object.insert("age".to_string(), 2.into());
                object.retain(|key, _| key != "version");
            }
            Ok(serde_json::to_string(&value)?)
        })])
    .unwrap()
}

#[tokio::test]
async fn test_proxy_rewrites_gzip_body() {
    let target = start_target().await;
    let proxy = start_proxy(target, pipeline()).await;

    let response = get(proxy, "/api/user").await;

    assert!(response.status().is_success());
    assert_eq!(response.headers()[CONTENT_ENCODING], "gzip");
    assert!(response.headers().get(CONTENT_LENGTH).is_none());
    assert_eq!(gunzip(response.body()), EXPECTED.as_bytes());
}

#[tokio::test]
async fn test_proxy_passes_unmatched_body_verbatim() {
    let target = start_target().await;
    let proxy = start_proxy(target, pipeline()).await;

    let direct = get(target, "/static").await;
    let proxied = get(proxy, "/static").await;

    assert_eq!(proxied.body(), direct.body());
    assert_eq!(gunzip(proxied.body()), ORIGINAL.as_bytes());
}
