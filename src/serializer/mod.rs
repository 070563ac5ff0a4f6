//! Transcript serialization.
//!
//! Pure projection of a record log into one human-readable text block. Each
//! record renders from a fixed per-kind template and no record influences
//! another's rendering, so the function can be re-run on every incremental
//! snapshot without drift.

use crate::types::{EventRecord, RecordPayload};

/// Character budget for pretty-printed tool input previews.
const TOOL_INPUT_PREVIEW_LIMIT: usize = 600;

/// Character budget for tool result previews.
const TOOL_RESULT_PREVIEW_LIMIT: usize = 600;

/// Serialize an ordered record list into transcript text.
///
/// Deterministic and total: the same records always produce the same text.
pub fn serialize(records: &[EventRecord]) -> String {
    let blocks: Vec<String> = records.iter().filter_map(render_record).collect();
    blocks.join("\n\n")
}

/// Render one record, or `None` for lifecycle markers with no visible form.
fn render_record(record: &EventRecord) -> Option<String> {
    match &record.payload {
        RecordPayload::RunStarted { .. }
        | RecordPayload::Complete { .. }
        | RecordPayload::TraceSaved { .. } => None,
        RecordPayload::TurnStart { turn } => Some(format!("[turn {turn}]")),
        RecordPayload::Assistant { text } => Some(text.clone()),
        RecordPayload::ToolCall { name, input } => {
            let mut block = format!("tool: {name}");
            if let Some(input) = input {
                let pretty =
                    serde_json::to_string_pretty(input).unwrap_or_else(|_| input.to_string());
                block.push('\n');
                block.push_str(&truncate(&pretty, TOOL_INPUT_PREVIEW_LIMIT));
            }
            Some(block)
        }
        RecordPayload::ToolResult { name, result } => {
            let preview = truncate(result, TOOL_RESULT_PREVIEW_LIMIT);
            Some(match name {
                Some(name) => format!("result ({name}): {preview}"),
                None => format!("result: {preview}"),
            })
        }
        RecordPayload::OutputFile { file } => Some(format!("file: {}", file.name)),
        RecordPayload::Error { message } => Some(format!("[error] {message}")),
    }
}

/// Truncate to a character budget, marking the cut.
fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_owned();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{cut}… [truncated]")
}
