//! Wire event → record log translation.
//!
//! The mapper is the only place wire payloads are interpreted, and it never
//! fails: anything it cannot make sense of is dropped so that backend
//! additions do not break older clients.
//!
//! Assistant text fragments coalesce into the most recent record when (and
//! only when) that record is itself assistant text. Any interleaved tool
//! activity appends a record of a different kind in between, so the next
//! fragment naturally opens a new assistant paragraph. Paragraph boundaries
//! therefore always align with tool-call boundaries; downstream rendering
//! relies on this.

use tracing::debug;

use crate::types::{EventRecord, OutputFile, RecordLog, RecordPayload};
use crate::wire::WireEvent;

/// What applying one wire event did to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapOutcome {
    /// A new record was appended.
    Appended,
    /// Text was merged into the newest assistant record.
    Merged,
    /// The event was ignored.
    Dropped,
}

impl MapOutcome {
    /// Whether the log changed at all.
    pub fn changed(self) -> bool {
        !matches!(self, Self::Dropped)
    }
}

/// Apply one wire event to the log.
pub fn map_event(log: &mut RecordLog, event: &WireEvent) -> MapOutcome {
    match event.tag.as_str() {
        "run_started" => append(
            log,
            RecordPayload::RunStarted {
                trace_id: event.str_field("trace_id").map(str::to_owned),
                session_id: event.str_field("session_id").map(str::to_owned),
            },
        ),
        "turn_started" => {
            let turn = event
                .u64_field("turn")
                .or_else(|| event.u64_field("turn_index"))
                .unwrap_or_else(|| next_turn_number(log));
            append(log, RecordPayload::TurnStart { turn })
        }
        "assistant" | "assistant_delta" => match event.text_field("text") {
            Some(text) if !text.is_empty() => apply_assistant_fragment(log, &text),
            _ => drop_event(event, "assistant fragment without text"),
        },
        "tool_call" => match event.str_field("name") {
            Some(name) => append(
                log,
                RecordPayload::ToolCall {
                    name: name.to_owned(),
                    input: event.value_field("input").cloned(),
                },
            ),
            None => drop_event(event, "tool call without a name"),
        },
        "tool_result" => append(
            log,
            RecordPayload::ToolResult {
                name: event.str_field("name").map(str::to_owned),
                result: event.text_field("result").unwrap_or_default(),
            },
        ),
        "output_file" => match parse_output_file(event) {
            Some(file) => append(log, RecordPayload::OutputFile { file }),
            None => drop_event(event, "output file missing required fields"),
        },
        "complete" => {
            if log.has_complete() {
                return drop_event(event, "duplicate completion");
            }
            append(
                log,
                RecordPayload::Complete {
                    answer: event.str_field("answer").map(str::to_owned),
                    turns: event.u64_field("turns"),
                    success: event.bool_field("success").unwrap_or(true),
                },
            )
        }
        "error" => append(
            log,
            RecordPayload::Error {
                message: event
                    .text_field("message")
                    .or_else(|| event.text_field("error"))
                    .unwrap_or_else(|| "unknown error".to_owned()),
            },
        ),
        "trace_saved" => match event.str_field("trace_id") {
            Some(trace_id) => append(
                log,
                RecordPayload::TraceSaved {
                    trace_id: trace_id.to_owned(),
                },
            ),
            None => drop_event(event, "trace_saved without a trace id"),
        },
        _ => drop_event(event, "unrecognized tag"),
    }
}

fn append(log: &mut RecordLog, payload: RecordPayload) -> MapOutcome {
    log.push(EventRecord::new(payload));
    MapOutcome::Appended
}

fn drop_event(event: &WireEvent, reason: &str) -> MapOutcome {
    debug!(tag = %event.tag, reason, "dropping wire event");
    MapOutcome::Dropped
}

/// Merge a fragment into the newest assistant record, or open a new one.
fn apply_assistant_fragment(log: &mut RecordLog, fragment: &str) -> MapOutcome {
    if let Some(record) = log.last_mut() {
        if let RecordPayload::Assistant { text } = &mut record.payload {
            text.push_str(fragment);
            return MapOutcome::Merged;
        }
    }
    append(
        log,
        RecordPayload::Assistant {
            text: fragment.to_owned(),
        },
    )
}

fn next_turn_number(log: &RecordLog) -> u64 {
    let seen = log
        .iter()
        .filter(|r| matches!(r.payload, RecordPayload::TurnStart { .. }))
        .count() as u64;
    seen + 1
}

fn parse_output_file(event: &WireEvent) -> Option<OutputFile> {
    let id = event
        .str_field("file_id")
        .or_else(|| event.str_field("id"))?;
    let name = event
        .str_field("filename")
        .or_else(|| event.str_field("name"))?;
    let download_url = event
        .str_field("download_url")
        .or_else(|| event.str_field("url"))?;
    Some(OutputFile {
        id: id.to_owned(),
        name: name.to_owned(),
        download_url: download_url.to_owned(),
        content_type: event.str_field("content_type").map(str::to_owned),
    })
}
