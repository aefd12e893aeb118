use serde::{Deserialize, Serialize};
use std::fmt;

/// How the backend should deliver its answer.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Deliver the answer incrementally as server-sent events.
    #[default]
    Streaming,

    /// Deliver the answer as a single JSON document.
    Blocking,
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Streaming => write!(f, "streaming"),
            ResponseMode::Blocking => write!(f, "blocking"),
        }
    }
}
