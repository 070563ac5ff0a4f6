//! Run controller — owns the lifecycle of one agent run.
//!
//! The controller issues the outbound request, consumes the inbound event
//! stream through the mapper, applies each event fully (map, append, publish)
//! before touching the next, and reconciles final message state on
//! completion, cancellation, or transport failure. All public methods take
//! `&self`; interior state lives behind a mutex so cancellation and steering
//! can arrive from other tasks while `submit` drives the stream.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;
use crate::mapper::map_event;
use crate::serializer::serialize;
use crate::store::MessageStore;
use crate::transport::{AttachmentTransport, SteerTransport, StreamTransport};
use crate::types::{
    AttachedFile, Message, MessageId, MessagePatch, OutputFile, RecordLog, RecordPayload,
    RunConfig, RunRequest,
};

/// Run lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run in flight.
    Idle,
    /// Request built, stream not yet open.
    Submitting,
    /// Consuming the event stream.
    Streaming,
}

/// Terminal outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The service reported completion and the message was finalized.
    Completed,
    /// Cancelled after progress; the partial transcript was kept.
    CancelledWithProgress,
    /// Cancelled before any record; the submission was undone entirely.
    Retracted,
    /// The run or its transport failed; error state was written to the message.
    Failed,
}

/// What a call to [`RunController::submit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Precondition not met (blank text, or active run without a trace id).
    Ignored,
    /// An active run with a known trace id absorbed the text as steering.
    Steered,
    /// A run was executed to a terminal outcome.
    Ran(RunOutcome),
}

/// Point-in-time view of the in-flight run.
///
/// Text, records, and files are updated together: an observer never sees a
/// serialization that does not match the log it was derived from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSnapshot {
    pub text: String,
    pub records: RecordLog,
    pub output_files: Vec<OutputFile>,
}

#[derive(Debug)]
struct ActiveRun {
    state: RunState,
    trace_id: Option<String>,
    cancel: CancellationToken,
    /// Set by `cancel()`; distinguishes user cancellation from stream end.
    cancelled: bool,
}

/// The run-streaming engine.
pub struct RunController {
    stream: Arc<dyn StreamTransport>,
    steering: Arc<dyn SteerTransport>,
    attachments: Arc<dyn AttachmentTransport>,
    store: Arc<dyn MessageStore>,
    run_config: RunConfig,
    active: Mutex<Option<ActiveRun>>,
    snapshot_tx: watch::Sender<RunSnapshot>,
    snapshot_rx: watch::Receiver<RunSnapshot>,
}

impl RunController {
    pub fn new(
        stream: Arc<dyn StreamTransport>,
        steering: Arc<dyn SteerTransport>,
        attachments: Arc<dyn AttachmentTransport>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(RunSnapshot::default());
        Self {
            stream,
            steering,
            attachments,
            store,
            run_config: RunConfig::default(),
            active: Mutex::new(None),
            snapshot_tx,
            snapshot_rx,
        }
    }

    /// Configuration bag applied to every run request.
    pub fn with_run_config(mut self, config: RunConfig) -> Self {
        self.run_config = config;
        self
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> RunState {
        match self.active.lock().await.as_ref() {
            Some(run) => run.state,
            None => RunState::Idle,
        }
    }

    /// Trace id of the active run, once the service has announced it.
    pub async fn trace_id(&self) -> Option<String> {
        self.active
            .lock()
            .await
            .as_ref()
            .and_then(|run| run.trace_id.clone())
    }

    /// Subscribe to incremental `(text, records, files)` snapshots.
    pub fn watch_snapshot(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Submit a request, driving the run to a terminal outcome.
    ///
    /// Blank text is ignored. While a run is active the call is ignored if no
    /// trace id is known yet, and redirected to [`steer`](Self::steer)
    /// otherwise.
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }

        let cancel = CancellationToken::new();
        {
            let mut active = self.active.lock().await;
            if let Some(run) = active.as_ref() {
                // Can't start a second run; with a trace id the text becomes
                // steering, without one it is rejected outright (not queued).
                return match run.trace_id.clone() {
                    Some(trace_id) => {
                        drop(active);
                        self.send_steering(&trace_id, text).await;
                        Ok(SubmitOutcome::Steered)
                    }
                    None => Ok(SubmitOutcome::Ignored),
                };
            }
            *active = Some(ActiveRun {
                state: RunState::Submitting,
                trace_id: None,
                cancel: cancel.clone(),
                cancelled: false,
            });
        }

        let request = RunRequest::new(
            text,
            self.store.take_attachments(),
            self.run_config.clone(),
        );

        let user = Message::user(text);
        let user_id = user.id;
        let placeholder = Message::assistant_placeholder();
        let assistant_id = placeholder.id;
        self.store.push_message(user);
        self.store.push_message(placeholder);
        self.store.set_running(true);

        debug!(prompt_len = text.len(), "run submitted");
        let outcome = self.drive(request, user_id, assistant_id, &cancel).await;

        // Cleanup runs on every exit path: a leaked running flag or stale
        // snapshot after any outcome is a correctness bug.
        self.store.set_running(false);
        *self.active.lock().await = None;
        let _ = self.snapshot_tx.send(RunSnapshot::default());
        debug!(?outcome, "run finished");

        Ok(SubmitOutcome::Ran(outcome))
    }

    /// Signal cancellation of the active run.
    ///
    /// Returns `false` when no run is active. Message fate is resolved by the
    /// termination handler inside [`submit`](Self::submit), not here.
    pub async fn cancel(&self) -> bool {
        let mut active = self.active.lock().await;
        match active.as_mut() {
            Some(run) => {
                run.cancelled = true;
                run.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Send steering text into the active run's side channel.
    ///
    /// Returns `Ok(false)` when ignored: blank text, no active run, or no
    /// trace id known yet. Never touches the record log or lifecycle state.
    pub async fn steer(&self, text: &str) -> Result<bool> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(false);
        }
        let trace_id = match self.trace_id().await {
            Some(trace_id) => trace_id,
            None => return Ok(false),
        };
        self.send_steering(&trace_id, text).await;
        Ok(true)
    }

    /// Upload a file and stage it for the next submission.
    pub async fn stage_attachment(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<AttachedFile> {
        let file = self.attachments.upload(name, bytes, content_type).await?;
        self.store.push_attachment(file.clone());
        Ok(file)
    }

    /// Unstage an attachment and delete it remotely, best effort.
    pub async fn discard_attachment(&self, id: &str) -> bool {
        let Some(file) = self.store.remove_attachment(id) else {
            return false;
        };
        if let Err(err) = self.attachments.delete(&file.id).await {
            debug!(%err, file_id = %file.id, "attachment delete failed; ignoring");
        }
        true
    }

    // -- Internal --

    /// Fire-and-forget steering send; failures are logged and swallowed.
    async fn send_steering(&self, trace_id: &str, text: &str) {
        if let Err(err) = self.steering.steer(trace_id, text).await {
            warn!(%err, %trace_id, "steering send failed");
        }
    }

    /// Consume the stream and finalize the assistant message.
    ///
    /// Infallible by construction: every transport error is converted into
    /// one of the three termination outcomes.
    async fn drive(
        &self,
        request: RunRequest,
        user_id: MessageId,
        assistant_id: MessageId,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let mut log = RecordLog::new();
        let mut stream_error: Option<String> = None;

        let stream = self.stream.open(&request, cancel).await;
        match stream {
            Ok(mut events) => {
                self.set_state(RunState::Streaming).await;

                // Strictly one event at a time: map, react, publish, then poll
                // the next. Snapshots therefore always match the log.
                while let Some(event) = events.next().await {
                    match event {
                        Ok(event) => {
                            if map_event(&mut log, &event).changed() {
                                self.apply_side_effects(&log).await;
                                self.publish_snapshot(&log);
                            }
                        }
                        Err(err) if err.is_cancellation() => break,
                        Err(err) => {
                            stream_error = Some(err.to_string());
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                stream_error = Some(err.to_string());
            }
        }

        let user_cancelled = self
            .active
            .lock()
            .await
            .as_ref()
            .is_some_and(|run| run.cancelled);

        if user_cancelled {
            self.finalize_cancelled(log, user_id, assistant_id).await
        } else if let Some(message) = stream_error {
            self.finalize_failed(log, assistant_id, message).await
        } else {
            self.finalize_completed(log, assistant_id).await
        }
    }

    /// React to records the UI needs before the run completes.
    async fn apply_side_effects(&self, log: &RecordLog) {
        let Some(record) = log.last() else { return };
        match &record.payload {
            RecordPayload::RunStarted {
                trace_id,
                session_id,
            } => {
                if let Some(trace_id) = trace_id {
                    self.set_trace_id(trace_id).await;
                }
                if session_id.is_some() {
                    self.store.set_session_id(session_id.clone());
                }
            }
            // A late trace announcement still makes steering addressable.
            RecordPayload::TraceSaved { trace_id } => self.set_trace_id(trace_id).await,
            _ => {}
        }
    }

    async fn set_trace_id(&self, trace_id: &str) {
        let mut active = self.active.lock().await;
        if let Some(run) = active.as_mut() {
            if run.trace_id.is_none() {
                run.trace_id = Some(trace_id.to_owned());
            }
        }
    }

    async fn set_state(&self, state: RunState) {
        if let Some(run) = self.active.lock().await.as_mut() {
            run.state = state;
        }
    }

    fn publish_snapshot(&self, log: &RecordLog) {
        let _ = self.snapshot_tx.send(RunSnapshot {
            text: serialize(log.records()),
            records: log.clone(),
            output_files: log.output_files(),
        });
    }

    /// Natural stream end. A recorded error (explicit event or unsuccessful
    /// completion) still finalizes as a failure; the first one wins.
    async fn finalize_completed(&self, log: RecordLog, assistant_id: MessageId) -> RunOutcome {
        if let Some(message) = log.first_error_message().map(str::to_owned) {
            self.finalize_with_log(log, assistant_id, Some(message));
            return RunOutcome::Failed;
        }

        let answer = log.iter().find_map(|r| match &r.payload {
            RecordPayload::Complete { answer, .. } => answer.clone(),
            _ => None,
        });
        let mut content = serialize(log.records());
        if content.is_empty() {
            content = answer.unwrap_or_default();
        }

        let trace_id = self.trace_id().await;
        self.store.update_message(
            assistant_id,
            MessagePatch {
                content: Some(content),
                trace_id,
                output_files: Some(log.output_files()),
                records: Some(log),
                is_loading: Some(false),
                ..Default::default()
            },
        );
        RunOutcome::Completed
    }

    /// User cancellation: graceful stop with progress, full retraction without.
    async fn finalize_cancelled(
        &self,
        log: RecordLog,
        user_id: MessageId,
        assistant_id: MessageId,
    ) -> RunOutcome {
        if log.is_empty() {
            self.store.remove_message(assistant_id);
            self.store.remove_message(user_id);
            debug!("run cancelled before progress; submission retracted");
            return RunOutcome::Retracted;
        }

        let trace_id = self.trace_id().await;
        self.store.update_message(
            assistant_id,
            MessagePatch {
                content: Some(serialize(log.records())),
                trace_id,
                output_files: Some(log.output_files()),
                records: Some(log),
                is_loading: Some(false),
                ..Default::default()
            },
        );
        RunOutcome::CancelledWithProgress
    }

    /// Transport failure: preserve partial progress behind an error flag.
    async fn finalize_failed(
        &self,
        mut log: RecordLog,
        assistant_id: MessageId,
        message: String,
    ) -> RunOutcome {
        warn!(error = %message, records = log.len(), "run stream failed");

        if log.is_empty() {
            // Nothing to preserve.
            self.store.update_message(
                assistant_id,
                MessagePatch {
                    is_loading: Some(false),
                    error: Some(message),
                    ..Default::default()
                },
            );
            return RunOutcome::Failed;
        }

        log.push(crate::types::EventRecord::new(RecordPayload::Error {
            message: format!("connection lost: {message}"),
        }));
        self.finalize_with_log(log, assistant_id, Some(message));
        RunOutcome::Failed
    }

    fn finalize_with_log(&self, log: RecordLog, assistant_id: MessageId, error: Option<String>) {
        self.store.update_message(
            assistant_id,
            MessagePatch {
                content: Some(serialize(log.records())),
                output_files: Some(log.output_files()),
                records: Some(log),
                is_loading: Some(false),
                error,
                ..Default::default()
            },
        );
    }
}
