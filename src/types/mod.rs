//! Core data model: records, messages, run requests.

pub mod message;
pub mod record;
pub mod request;

pub use message::{Message, MessageId, MessagePatch, MessageRole};
pub use record::{EventRecord, OutputFile, RecordKind, RecordLog, RecordPayload};
pub use request::{AttachedFile, RunConfig, RunRequest};
