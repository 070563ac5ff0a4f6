//! Shared test support: scripted transports and recording side channels.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use tether::engine::RunController;
use tether::error::{Result, TetherError};
use tether::store::InMemoryStore;
use tether::transport::{
    AttachmentTransport, BulkRunResult, BulkStreamAdapter, BulkTransport, SteerTransport,
    StreamTransport, WireEventStream,
};
use tether::types::{AttachedFile, RunRequest};
use tether::wire::WireEvent;

/// Build a wire event from a tag and JSON body.
pub fn ev(tag: &str, body: serde_json::Value) -> WireEvent {
    WireEvent::new(tag, body)
}

/// What the scripted stream does once its events are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tail {
    /// End the stream, as a naturally finished run does.
    End,
    /// Fail with a connection-style error.
    Fail,
    /// Stay open until the cancellation token trips.
    Hang,
}

/// Stream transport that replays a scripted event list.
pub struct ScriptedTransport {
    events: Mutex<Vec<WireEvent>>,
    tail: Tail,
}

impl ScriptedTransport {
    pub fn new(events: Vec<WireEvent>, tail: Tail) -> Self {
        Self {
            events: Mutex::new(events),
            tail,
        }
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn open(
        &self,
        _request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<WireEventStream> {
        let events = std::mem::take(&mut *self.events.lock().unwrap());
        let scripted = futures::stream::iter(events.into_iter().map(Ok));

        let stream: WireEventStream = match self.tail {
            Tail::End => scripted.boxed(),
            Tail::Fail => scripted
                .chain(futures::stream::once(async {
                    Err(TetherError::Stream("connection reset".into()))
                }))
                .boxed(),
            Tail::Hang => {
                let token = cancel.clone();
                scripted
                    .chain(futures::stream::once(async move {
                        token.cancelled().await;
                        Err(TetherError::Cancelled)
                    }))
                    .boxed()
            }
        };
        Ok(stream)
    }
}

/// Bulk transport that returns a fixed result.
pub struct FixedBulk {
    pub events: Vec<WireEvent>,
    pub answer: Option<String>,
}

#[async_trait]
impl BulkTransport for FixedBulk {
    async fn fetch(&self, _request: &RunRequest) -> Result<BulkRunResult> {
        Ok(BulkRunResult {
            events: self.events.clone(),
            answer: self.answer.clone(),
        })
    }
}

/// Steer transport that records every send.
#[derive(Default)]
pub struct RecordingSteer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSteer {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SteerTransport for RecordingSteer {
    async fn steer(&self, trace_id: &str, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((trace_id.to_owned(), text.to_owned()));
        Ok(())
    }
}

/// Attachment transport that accepts uploads and deletes without a backend.
#[derive(Default)]
pub struct NoopAttachments;

#[async_trait]
impl AttachmentTransport for NoopAttachments {
    async fn upload(
        &self,
        name: &str,
        _bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<AttachedFile> {
        Ok(AttachedFile {
            id: format!("file-{name}"),
            name: name.to_owned(),
            path: None,
            content_type: content_type.map(str::to_owned),
        })
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Ok(())
    }
}

/// Engine wired to the given stream transport plus recording collaborators.
pub fn harness_with(
    stream: Arc<dyn StreamTransport>,
) -> (Arc<RunController>, Arc<InMemoryStore>, Arc<RecordingSteer>) {
    let store = Arc::new(InMemoryStore::new());
    let steer = Arc::new(RecordingSteer::default());
    let controller = Arc::new(RunController::new(
        stream,
        steer.clone(),
        Arc::new(NoopAttachments),
        store.clone(),
    ));
    (controller, store, steer)
}

/// Engine wired to a scripted stream.
pub fn harness(
    events: Vec<WireEvent>,
    tail: Tail,
) -> (Arc<RunController>, Arc<InMemoryStore>, Arc<RecordingSteer>) {
    harness_with(Arc::new(ScriptedTransport::new(events, tail)))
}

/// Engine wired to the bulk path through the stream adapter.
pub fn harness_bulk(
    events: Vec<WireEvent>,
    answer: Option<String>,
) -> (Arc<RunController>, Arc<InMemoryStore>, Arc<RecordingSteer>) {
    harness_with(Arc::new(BulkStreamAdapter(FixedBulk { events, answer })))
}
