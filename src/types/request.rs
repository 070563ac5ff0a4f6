//! Run request types.

use bon::Builder;
use serde::{Deserialize, Serialize};

/// A file staged for submission alongside a prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachedFile {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Configuration bag for a run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default)]
pub struct RunConfig {
    #[builder(default)]
    pub skills: Vec<String>,
    #[builder(default)]
    pub allowed_tools: Vec<String>,
    #[builder(default)]
    pub mcp_servers: Vec<String>,
    pub system_prompt: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub executor: Option<String>,
    pub max_turns: Option<u32>,
}

/// Immutable description of one run submission.
///
/// Constructed once per `submit` and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct RunRequest {
    pub prompt: String,
    pub attachments: Vec<AttachedFile>,
    pub config: RunConfig,
}

impl RunRequest {
    pub fn new(prompt: impl Into<String>, attachments: Vec<AttachedFile>, config: RunConfig) -> Self {
        Self {
            prompt: prompt.into(),
            attachments,
            config,
        }
    }
}
