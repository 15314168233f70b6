//! Conversation history keyed by thread.

use std::collections::HashMap;

use crate::turn::Message;

/// Keeps multi-turn history on behalf of the session.
///
/// The session only ever hands over a `thread_id` it was configured with; implementations
/// decide what it means.
pub trait Checkpointer: Send {
    /// Returns the history of `thread_id`, oldest first.
    fn load(&self, thread_id: &str) -> Vec<Message>;

    /// Appends messages to `thread_id`.
    fn append(&mut self, thread_id: &str, messages: Vec<Message>);

    /// Forgets `thread_id`.
    fn clear(&mut self, thread_id: &str);
}

/// In-process checkpointer.  History lives as long as the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryCheckpointer {
    threads: HashMap<String, Vec<Message>>,
}

impl MemoryCheckpointer {
    /// Creates an empty checkpointer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads with history.
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
}

impl Checkpointer for MemoryCheckpointer {
    fn load(&self, thread_id: &str) -> Vec<Message> {
        self.threads.get(thread_id).cloned().unwrap_or_default()
    }

    fn append(&mut self, thread_id: &str, messages: Vec<Message>) {
        self.threads
            .entry(thread_id.to_string())
            .or_default()
            .extend(messages);
    }

    fn clear(&mut self, thread_id: &str) {
        self.threads.remove(thread_id);
    }
}
