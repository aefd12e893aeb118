use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ResponseMode;

/// The body of one `POST <base>/chat-messages` request.
///
/// One request is issued per user query.  The `conversation_id` is empty on the first exchange
/// and carries the backend-assigned id on every exchange after that, so the backend keeps the
/// conversation's context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Application-defined input variables.  Always empty for the chat widget.
    pub inputs: Map<String, Value>,

    /// The user's query, as typed.
    pub query: String,

    /// Delivery mode of the answer.
    pub response_mode: ResponseMode,

    /// The conversation id, or the empty string before one has been assigned.
    pub conversation_id: String,

    /// Identifier of the end user.
    pub user: String,

    /// Attached files.  Always empty for the chat widget.
    pub files: Vec<Value>,
}

impl ChatRequest {
    /// Create a streaming request for `query`.
    pub fn new(
        query: impl Into<String>,
        conversation_id: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            inputs: Map::new(),
            query: query.into(),
            response_mode: ResponseMode::Streaming,
            conversation_id: conversation_id.into(),
            user: user.into(),
            files: Vec::new(),
        }
    }

    /// Set the response mode.
    pub fn with_response_mode(mut self, response_mode: ResponseMode) -> Self {
        self.response_mode = response_mode;
        self
    }
}
