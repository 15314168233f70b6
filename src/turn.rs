use serde::{Deserialize, Serialize};

/// Who sent a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person at the prompt.
    User,
    /// The model.
    Assistant,
}

/// One entry of a thread's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The sender.
    pub role: Role,
    /// The text of the message.  For the assistant this is the answer channel only.
    pub text: String,
}

impl Message {
    /// A message from the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// A message from the assistant.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// One user input together with the thread it belongs to.
///
/// `history` holds earlier messages of the same thread as loaded from the checkpointer; it never
/// contains `input` itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    /// Opaque identifier of the conversation.
    pub thread_id: String,
    /// What the user typed.
    pub input: String,
    /// Prior messages of the thread, oldest first.
    pub history: Vec<Message>,
}

impl Turn {
    /// Creates a turn with no history.
    pub fn new(thread_id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            input: input.into(),
            history: Vec::new(),
        }
    }

    /// Attaches prior history.
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// The history followed by the new input, as `(role, text)` pairs in send order.
    pub fn exchange(&self) -> impl Iterator<Item = (Role, &str)> + '_ {
        self.history
            .iter()
            .map(|m| (m.role, m.text.as_str()))
            .chain(std::iter::once((Role::User, self.input.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_ends_with_input() {
        let turn = Turn::new("1", "and then?")
            .with_history(vec![Message::user("hi"), Message::assistant("hello")]);
        let exchange: Vec<(Role, &str)> = turn.exchange().collect();
        assert_eq!(
            exchange,
            vec![
                (Role::User, "hi"),
                (Role::Assistant, "hello"),
                (Role::User, "and then?"),
            ]
        );
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","text":"x"}"#);
    }
}
