// Public modules
pub mod chat_request;
pub mod message;
pub mod response_mode;
pub mod stream_frame;

// Re-exports
pub use chat_request::ChatRequest;
pub use message::{Message, Role};
pub use response_mode::ResponseMode;
pub use stream_frame::StreamFrame;
