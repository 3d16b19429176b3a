//! Shared fixtures for pipeline integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::{GzEncoder, ZlibDecoder, ZlibEncoder};
use flate2::read::GzDecoder;
use flate2::Compression;
use refract_pipeline::{Error, ErrorObserver, RequestHead, ResponseSink, Result};
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

/// Observer recording every report
#[derive(Debug, Default)]
pub struct RecordingObserver {
    reports: Mutex<Vec<(String, String)>>,
}

impl RecordingObserver {
    pub fn reports(&self) -> Vec<(String, String)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl ErrorObserver for RecordingObserver {
    fn report(&self, error: &Error, request: &RequestHead) {
        self.reports
            .lock()
            .unwrap()
            .push((request.path().to_string(), error.to_string()));
    }
}

/// Sink collecting chunks and counting `end` calls
#[derive(Debug, Default, Clone)]
pub struct CollectSink {
    chunks: Arc<Mutex<Vec<Bytes>>>,
    ends: Arc<Mutex<usize>>,
}

impl CollectSink {
    pub fn body(&self) -> Vec<u8> {
        self.chunks.lock().unwrap().concat()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    pub fn ends(&self) -> usize {
        *self.ends.lock().unwrap()
    }
}

#[async_trait]
impl ResponseSink for CollectSink {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.chunks.lock().unwrap().push(chunk);
        Ok(())
    }

    async fn end(&mut self) -> Result<()> {
        *self.ends.lock().unwrap() += 1;
        Ok(())
    }
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn inflate(data: &[u8]) -> Vec<u8> {
    let mut decoder = ZlibDecoder::new(Vec::new());
    decoder.write_all(data).unwrap();
    decoder.finish().unwrap()
}
