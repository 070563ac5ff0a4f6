//! Message/session store boundary.
//!
//! The engine does not own display state; it reads and mutates it through
//! [`MessageStore`]. Embedders adapt their own stores to this trait.
//! [`InMemoryStore`] is a complete implementation for tests and simple hosts.

use std::sync::RwLock;

use crate::types::{AttachedFile, Message, MessageId, MessagePatch};

/// Adapter interface over the host's message and session state.
pub trait MessageStore: Send + Sync {
    /// Append a message to the transcript.
    fn push_message(&self, message: Message);

    /// Apply a patch to a stored message. Returns `false` if the id is unknown.
    fn update_message(&self, id: MessageId, patch: MessagePatch) -> bool;

    /// Remove a message by id. Returns `false` if the id is unknown.
    fn remove_message(&self, id: MessageId) -> bool;

    /// Snapshot of all messages, in insertion order.
    fn messages(&self) -> Vec<Message>;

    /// Flag that a run is in flight.
    fn set_running(&self, running: bool);

    fn is_running(&self) -> bool;

    /// Stage a file attachment for the next submission.
    fn push_attachment(&self, file: AttachedFile);

    /// Unstage one attachment by file id.
    fn remove_attachment(&self, id: &str) -> Option<AttachedFile>;

    /// Take all staged attachments, leaving none behind.
    fn take_attachments(&self) -> Vec<AttachedFile>;

    fn attachments(&self) -> Vec<AttachedFile>;

    /// Record the session id announced by a run.
    fn set_session_id(&self, session_id: Option<String>);

    fn session_id(&self) -> Option<String>;
}

#[derive(Debug, Default)]
struct StoreState {
    messages: Vec<Message>,
    attachments: Vec<AttachedFile>,
    running: bool,
    session_id: Option<String>,
}

/// In-memory [`MessageStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages currently held.
    pub fn message_count(&self) -> usize {
        self.state.read().unwrap().messages.len()
    }
}

impl MessageStore for InMemoryStore {
    fn push_message(&self, message: Message) {
        self.state.write().unwrap().messages.push(message);
    }

    fn update_message(&self, id: MessageId, patch: MessagePatch) -> bool {
        let mut state = self.state.write().unwrap();
        match state.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.apply(patch);
                true
            }
            None => false,
        }
    }

    fn remove_message(&self, id: MessageId) -> bool {
        let mut state = self.state.write().unwrap();
        let before = state.messages.len();
        state.messages.retain(|m| m.id != id);
        state.messages.len() != before
    }

    fn messages(&self) -> Vec<Message> {
        self.state.read().unwrap().messages.clone()
    }

    fn set_running(&self, running: bool) {
        self.state.write().unwrap().running = running;
    }

    fn is_running(&self) -> bool {
        self.state.read().unwrap().running
    }

    fn push_attachment(&self, file: AttachedFile) {
        self.state.write().unwrap().attachments.push(file);
    }

    fn remove_attachment(&self, id: &str) -> Option<AttachedFile> {
        let mut state = self.state.write().unwrap();
        let index = state.attachments.iter().position(|f| f.id == id)?;
        Some(state.attachments.remove(index))
    }

    fn take_attachments(&self) -> Vec<AttachedFile> {
        std::mem::take(&mut self.state.write().unwrap().attachments)
    }

    fn attachments(&self) -> Vec<AttachedFile> {
        self.state.read().unwrap().attachments.clone()
    }

    fn set_session_id(&self, session_id: Option<String>) {
        self.state.write().unwrap().session_id = session_id;
    }

    fn session_id(&self) -> Option<String> {
        self.state.read().unwrap().session_id.clone()
    }
}
