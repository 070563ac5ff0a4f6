//! Incremental SSE parsing for the run event stream.

use tracing::debug;

use crate::wire::WireEvent;

/// Buffering parser for server-sent event frames.
///
/// Frames are separated by a blank line; `data:` lines within a frame carry
/// JSON wire events. Anything that fails to parse is dropped, consistent with
/// the mapper's treatment of unknown input.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and drain any completed events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<WireEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut events = Vec::new();

        while let Some(split) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..split + 2).collect();
            if let Some(payload) = extract_data_payload(&frame) {
                if payload == "[DONE]" {
                    continue;
                }
                match serde_json::from_str::<WireEvent>(&payload) {
                    Ok(event) => events.push(event),
                    Err(err) => debug!(%err, "dropping unparseable SSE payload"),
                }
            }
        }

        events
    }

    /// Whether partial frame data is still buffered.
    pub fn has_partial_frame(&self) -> bool {
        !self.buffer.trim().is_empty()
    }
}

/// Join the `data:` lines of one frame.
fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}
