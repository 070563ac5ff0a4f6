//! Transport boundaries to the agent-execution service.
//!
//! The engine consumes these traits; [`HttpTransport`] implements all of them
//! over the service's REST/SSE surface. Tests swap in scripted
//! implementations.

pub mod http;
pub mod sse;

pub use http::HttpTransport;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::{AttachedFile, RunRequest};
use crate::wire::WireEvent;

/// Ordered sequence of wire events for one run.
pub type WireEventStream = BoxStream<'static, Result<WireEvent>>;

/// Delivers the event stream of a run.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open the event stream for a run.
    ///
    /// The cancellation token is advisory: tripping it should end the stream
    /// promptly, but events already delivered stay delivered and the engine
    /// alone decides message fate.
    async fn open(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<WireEventStream>;
}

/// Side channel into an already-running run.
#[async_trait]
pub trait SteerTransport: Send + Sync {
    /// Send auxiliary guidance addressed by trace id. Fire-and-forget.
    async fn steer(&self, trace_id: &str, text: &str) -> Result<()>;
}

/// Stages and retracts file attachments.
#[async_trait]
pub trait AttachmentTransport: Send + Sync {
    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<AttachedFile>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Non-streaming run result: the full step list plus the final answer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkRunResult {
    #[serde(default)]
    pub events: Vec<WireEvent>,
    #[serde(default)]
    pub answer: Option<String>,
}

/// Non-streaming companion to [`StreamTransport`].
#[async_trait]
pub trait BulkTransport: Send + Sync {
    async fn fetch(&self, request: &RunRequest) -> Result<BulkRunResult>;
}

/// Degrades a [`BulkTransport`] to the streaming model by replaying its step
/// list as an ordinary event stream, so the engine applies the exact same
/// mapping rules on both paths.
pub struct BulkStreamAdapter<T>(pub T);

#[async_trait]
impl<T: BulkTransport> StreamTransport for BulkStreamAdapter<T> {
    async fn open(
        &self,
        request: &RunRequest,
        _cancel: &CancellationToken,
    ) -> Result<WireEventStream> {
        let mut result = self.0.fetch(request).await?;

        // A bulk result may omit the terminal marker; synthesize one so the
        // engine always observes a completion.
        if !result.events.iter().any(|e| e.tag == "complete") {
            let mut fields = serde_json::Map::new();
            if let Some(answer) = result.answer.take() {
                fields.insert("answer".to_owned(), serde_json::Value::String(answer));
            }
            result.events.push(WireEvent {
                tag: "complete".to_owned(),
                fields,
            });
        }

        Ok(futures::stream::iter(result.events.into_iter().map(Ok)).boxed())
    }
}
