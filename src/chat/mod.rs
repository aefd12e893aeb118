//! The chat widget: session, async driver and UI-facing operations.
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: the session state machine, free of I/O
//! - [`conversation`]: drives a session over a [`Transport`](crate::client::Transport)
//! - [`widget`]: open/close, pointer, voice and submit operations for a presentation layer
//! - [`commands`]: slash command parsing for the terminal front end

mod commands;
mod config;
mod conversation;
mod session;
mod widget;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{
    ChatArgs, ChatConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, DEFAULT_USER,
    DEFAULT_WELCOME_MESSAGE,
};
pub use conversation::{Conversation, ExchangeOutcome, SharedSession};
pub use session::{ChatSession, Exchange, SessionState};
pub use widget::{ChatWidget, PointerEvent};
