use serde::{Deserialize, Serialize};

/// One decoded unit from the response stream.
///
/// Produced by the frame decoder and consumed by the session; never stored.  Empty strings on
/// the wire are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFrame {
    /// The conversation id assigned by the backend.
    #[serde(
        rename = "conversation_id",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty"
    )]
    pub session_id: Option<String>,

    /// A fragment of the answer to append to the open assistant message.
    #[serde(
        rename = "answer",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty"
    )]
    pub answer_delta: Option<String>,
}

impl StreamFrame {
    /// A frame carrying only a conversation id.
    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            answer_delta: None,
        }
    }

    /// A frame carrying only an answer fragment.
    pub fn answer(delta: impl Into<String>) -> Self {
        Self {
            session_id: None,
            answer_delta: Some(delta.into()),
        }
    }

    /// True when the frame carries nothing the session acts on.
    pub fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.answer_delta.is_none()
    }
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_wire_fields() {
        let frame: StreamFrame = serde_json::from_value(json!({
            "event": "message",
            "conversation_id": "abc",
            "answer": "Hi ",
            "created_at": 1705398420
        }))
        .unwrap();
        assert_eq!(frame.session_id.as_deref(), Some("abc"));
        assert_eq!(frame.answer_delta.as_deref(), Some("Hi "));
    }

    #[test]
    fn empty_strings_are_absent() {
        let frame: StreamFrame =
            serde_json::from_value(json!({"conversation_id": "", "answer": ""})).unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn null_fields_are_absent() {
        let frame: StreamFrame =
            serde_json::from_value(json!({"conversation_id": null, "answer": "x"})).unwrap();
        assert_eq!(frame, StreamFrame::answer("x"));
    }
}
