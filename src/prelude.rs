//! Convenience re-exports for common use.

pub use crate::config::ServiceConfig;
pub use crate::engine::{RunController, RunOutcome, RunSnapshot, RunState, SubmitOutcome};
pub use crate::error::{Result, TetherError};
pub use crate::store::{InMemoryStore, MessageStore};
pub use crate::transport::{
    AttachmentTransport, BulkStreamAdapter, BulkTransport, HttpTransport, SteerTransport,
    StreamTransport,
};
pub use crate::types::{
    AttachedFile, EventRecord, Message, MessageRole, OutputFile, RecordKind, RecordLog,
    RecordPayload, RunConfig, RunRequest,
};
pub use crate::wire::WireEvent;
