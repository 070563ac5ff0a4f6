//! Event records — the stable representation of what happened in a run.
//!
//! Wire events are loose and unstable; records are the engine's own closed
//! model. The ordered [`RecordLog`] is the single source of truth for a run:
//! once appended a record is immutable, with one exception — assistant text
//! merging, which only the mapper performs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Closed set of record kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordKind {
    RunStarted,
    TurnStart,
    Assistant,
    ToolCall,
    ToolResult,
    OutputFile,
    Complete,
    Error,
    TraceSaved,
}

/// A file produced by the agent during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputFile {
    pub id: String,
    pub name: String,
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Kind-specific record payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordPayload {
    RunStarted {
        trace_id: Option<String>,
        session_id: Option<String>,
    },
    TurnStart {
        turn: u64,
    },
    Assistant {
        text: String,
    },
    ToolCall {
        name: String,
        input: Option<serde_json::Value>,
    },
    ToolResult {
        name: Option<String>,
        result: String,
    },
    OutputFile {
        file: OutputFile,
    },
    Complete {
        answer: Option<String>,
        turns: Option<u64>,
        success: bool,
    },
    Error {
        message: String,
    },
    TraceSaved {
        trace_id: String,
    },
}

impl RecordPayload {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::RunStarted { .. } => RecordKind::RunStarted,
            Self::TurnStart { .. } => RecordKind::TurnStart,
            Self::Assistant { .. } => RecordKind::Assistant,
            Self::ToolCall { .. } => RecordKind::ToolCall,
            Self::ToolResult { .. } => RecordKind::ToolResult,
            Self::OutputFile { .. } => RecordKind::OutputFile,
            Self::Complete { .. } => RecordKind::Complete,
            Self::Error { .. } => RecordKind::Error,
            Self::TraceSaved { .. } => RecordKind::TraceSaved,
        }
    }
}

/// One meaningful occurrence in a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: RecordPayload,
}

impl EventRecord {
    pub fn new(payload: RecordPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.payload.kind()
    }
}

/// Append-only ordered log of [`EventRecord`]s for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordLog(Vec<EventRecord>);

impl RecordLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EventRecord) {
        self.0.push(record);
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.0
    }

    pub fn last(&self) -> Option<&EventRecord> {
        self.0.last()
    }

    /// Mutable access to the newest record, for assistant-fragment merging.
    pub(crate) fn last_mut(&mut self) -> Option<&mut EventRecord> {
        self.0.last_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EventRecord> {
        self.0.iter()
    }

    /// Whether a completion has already been recorded.
    pub fn has_complete(&self) -> bool {
        self.0
            .iter()
            .any(|r| matches!(r.payload, RecordPayload::Complete { .. }))
    }

    /// The first error message in the log, from either an explicit error
    /// record or an unsuccessful completion. First occurrence wins.
    pub fn first_error_message(&self) -> Option<&str> {
        self.0.iter().find_map(|r| match &r.payload {
            RecordPayload::Error { message } => Some(message.as_str()),
            RecordPayload::Complete {
                success: false,
                answer,
                ..
            } => Some(answer.as_deref().unwrap_or("run reported failure")),
            _ => None,
        })
    }

    /// All output files announced so far, in arrival order.
    pub fn output_files(&self) -> Vec<OutputFile> {
        self.0
            .iter()
            .filter_map(|r| match &r.payload {
                RecordPayload::OutputFile { file } => Some(file.clone()),
                _ => None,
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a RecordLog {
    type Item = &'a EventRecord;
    type IntoIter = std::slice::Iter<'a, EventRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
