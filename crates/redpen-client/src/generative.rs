//! HTTP client for the generative suggestion service.
//!
//! Batch checks go through `POST {base}/v1/suggestions`. Streaming opens
//! `POST {base}/v1/suggestions/stream` and decodes server-sent events into
//! typed frames as chunks arrive; the decoder is a pure byte-buffer state
//! machine so chunk boundaries never split an event.

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use redpen_core::CheckError;
use redpen_engine::{GenerativeRequest, GenerativeResponse, GenerativeService, StreamFrame};
use tracing::{debug, warn};

use crate::transport::{ClientConfig, build_http, status_error, transport_error};

/// Batch and streaming client for the generative service.
pub struct GenerativeClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl GenerativeClient {
    pub fn new(config: ClientConfig) -> Result<Self, CheckError> {
        Ok(Self { client: build_http(&config)?, config })
    }

    fn post(&self, url: &str, request: &GenerativeRequest) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(url).json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }
}

impl GenerativeService for GenerativeClient {
    async fn check(&self, request: &GenerativeRequest) -> Result<GenerativeResponse, CheckError> {
        let url = format!("{}/v1/suggestions", self.config.base_url);
        debug!(url = %url, check_type = %request.check_type, "generative batch request");

        let resp = self.post(&url, request).send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }
        resp.json()
            .await
            .map_err(|e| CheckError::Network(e.to_string()))
    }

    async fn open_stream(
        &self,
        request: &GenerativeRequest,
    ) -> Result<BoxStream<'static, Result<StreamFrame, CheckError>>, CheckError> {
        let url = format!("{}/v1/suggestions/stream", self.config.base_url);
        debug!(url = %url, "opening generative stream");

        let resp = self.post(&url, request).send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        let event_stream = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        if !event_stream {
            return Err(CheckError::StreamingUnsupported);
        }

        let mut decoder = SseDecoder::default();
        let frames = resp
            .bytes_stream()
            .flat_map(move |chunk| {
                let out: Vec<Result<StreamFrame, CheckError>> = match chunk {
                    Ok(bytes) => decoder.push(&bytes).into_iter().map(Ok).collect(),
                    Err(err) => vec![Err(transport_error(err))],
                };
                stream::iter(out)
            })
            .boxed();
        Ok(frames)
    }
}

/// Incremental server-sent-event decoder.
///
/// Events are blocks of lines terminated by a blank line; only `data:` lines
/// carry payload. Unparseable events are skipped rather than killing the
/// stream, so protocol additions stay backward compatible.
#[derive(Debug, Default)]
struct SseDecoder {
    buf: String,
}

impl SseDecoder {
    /// Feed one chunk, returning every frame completed by it.
    fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));

        let mut frames = Vec::new();
        while let Some(end) = self.buf.find("\n\n") {
            let event: String = self.buf.drain(..end + 2).collect();
            if let Some(frame) = decode_event(&event) {
                frames.push(frame);
            }
        }
        frames
    }
}

fn decode_event(event: &str) -> Option<StreamFrame> {
    let data: String = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n");
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str(&data) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!(error = %err, "skipping undecodable stream event");
            None
        }
    }
}
