//! Display-level message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{OutputFile, RecordLog};

/// Unique message identifier.
pub type MessageId = Uuid;

/// Message role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A message in the display transcript.
///
/// A user message is complete at creation. An assistant message starts
/// loading and is finalized exactly once by the engine when its run reaches
/// a terminal outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<RecordLog>,
    pub is_loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_files: Vec<OutputFile>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a complete user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::User,
            content: text.into(),
            trace_id: None,
            records: None,
            is_loading: false,
            error: None,
            output_files: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a loading assistant placeholder.
    pub fn assistant_placeholder() -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::Assistant,
            content: String::new(),
            trace_id: None,
            records: None,
            is_loading: true,
            error: None,
            output_files: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Apply a patch in place. `None` fields are left untouched.
    pub fn apply(&mut self, patch: MessagePatch) {
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(trace_id) = patch.trace_id {
            self.trace_id = Some(trace_id);
        }
        if let Some(records) = patch.records {
            self.records = Some(records);
        }
        if let Some(is_loading) = patch.is_loading {
            self.is_loading = is_loading;
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
        if let Some(output_files) = patch.output_files {
            self.output_files = output_files;
        }
    }
}

/// Partial update applied to a stored message.
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub trace_id: Option<String>,
    pub records: Option<RecordLog>,
    pub is_loading: Option<bool>,
    pub error: Option<String>,
    pub output_files: Option<Vec<OutputFile>>,
}
