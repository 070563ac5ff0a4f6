//! HTTP implementation of the service transports.

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::error::{status_to_error, Result, TetherError};
use crate::types::{AttachedFile, RunRequest};

use super::sse::SseParser;
use super::{
    AttachmentTransport, BulkRunResult, BulkTransport, SteerTransport, StreamTransport,
    WireEventStream,
};

/// REST/SSE client for the agent-execution service.
///
/// One instance implements every transport trait the engine consumes:
/// streaming runs, bulk runs, steering, and attachment staging.
pub struct HttpTransport {
    config: ServiceConfig,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        // No global timeout: it would sever long-lived event streams. The
        // per-call timeout from the config is applied to unary requests only.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(TetherError::Network)?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body));
        }
        Ok(resp)
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn open(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<WireEventStream> {
        let url = self.url("/runs/stream");
        debug!(%url, "opening run event stream");

        let resp = self
            .authorize(self.client.post(&url))
            .json(request)
            .send()
            .await?;
        let resp = Self::ensure_success(resp).await?;

        let byte_stream = resp.bytes_stream();
        let token = cancel.clone();

        let stream = async_stream::stream! {
            let mut parser = SseParser::new();
            futures::pin_mut!(byte_stream);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("event stream cancelled");
                        break;
                    }
                    chunk = byte_stream.next() => {
                        let Some(chunk) = chunk else { break };
                        match chunk {
                            Ok(bytes) => {
                                for event in parser.feed(&bytes) {
                                    yield Ok(event);
                                }
                            }
                            Err(err) => {
                                yield Err(TetherError::Network(err));
                                break;
                            }
                        }
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}

#[async_trait]
impl BulkTransport for HttpTransport {
    async fn fetch(&self, request: &RunRequest) -> Result<BulkRunResult> {
        let resp = self
            .authorize(self.client.post(self.url("/runs")))
            .timeout(self.config.timeout)
            .json(request)
            .send()
            .await?;
        let resp = Self::ensure_success(resp).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl SteerTransport for HttpTransport {
    async fn steer(&self, trace_id: &str, text: &str) -> Result<()> {
        let url = self.url(&format!("/runs/{trace_id}/steer"));
        debug!(%trace_id, "sending steering message");

        let resp = self
            .authorize(self.client.post(&url))
            .timeout(self.config.timeout)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        Self::ensure_success(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl AttachmentTransport for HttpTransport {
    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<AttachedFile> {
        let mut builder = self
            .authorize(self.client.post(self.url("/files")))
            .timeout(self.config.timeout)
            .query(&[("name", name)])
            .body(bytes);
        if let Some(content_type) = content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
        }

        let resp = Self::ensure_success(builder.send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let resp = self
            .authorize(self.client.delete(self.url(&format!("/files/{id}"))))
            .timeout(self.config.timeout)
            .send()
            .await?;
        Self::ensure_success(resp).await?;
        Ok(())
    }
}
