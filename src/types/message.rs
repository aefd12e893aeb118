use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a transcript entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text the user submitted.
    User,

    /// Text streamed from the assistant backend, or the welcome message.
    Assistant,

    /// A failed exchange, described for the user.
    Error,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Error => write!(f, "error"),
        }
    }
}

/// One transcript entry.
///
/// User and error messages are immutable once created.  An assistant message is "open" while
/// it still receives streamed deltas; only the session mutates it, and only while it is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    text: String,
    markup: String,
    #[serde(skip)]
    generation: Option<u64>,
}

impl Message {
    pub(crate) fn closed(role: Role, text: String, markup: String) -> Self {
        Self {
            role,
            text,
            markup,
            generation: None,
        }
    }

    pub(crate) fn open(generation: u64) -> Self {
        Self {
            role: Role::Assistant,
            text: String::new(),
            markup: String::new(),
            generation: Some(generation),
        }
    }

    /// Who produced this message.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The raw accumulated text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The display-safe markup for this message.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// True while the message is still receiving deltas.
    pub fn is_open(&self) -> bool {
        self.generation.is_some()
    }

    pub(crate) fn generation(&self) -> Option<u64> {
        self.generation
    }

    pub(crate) fn push_delta(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    pub(crate) fn set_markup(&mut self, markup: String) {
        self.markup = markup;
    }

    pub(crate) fn close(&mut self) {
        self.generation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_message_lifecycle() {
        let mut message = Message::open(3);
        assert!(message.is_open());
        assert_eq!(message.role(), Role::Assistant);
        assert_eq!(message.generation(), Some(3));
        message.push_delta("Hi ");
        message.push_delta("there");
        assert_eq!(message.text(), "Hi there");
        message.close();
        assert!(!message.is_open());
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Error.to_string(), "error");
    }
}
