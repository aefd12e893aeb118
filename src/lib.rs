//! A streaming chat widget client.
//!
//! `converse` keeps one conversation with an assistant backend that answers over a
//! server-sent-event stream.  Queries go out through a [`Transport`]; the response body is
//! decoded frame by frame, appended to the open assistant message and re-rendered to
//! display-safe markup on every delta.
//!
//! ```no_run
//! use converse::chat::{ChatConfig, ChatWidget};
//! use converse::{HttpTransport, PlainTextRenderer};
//!
//! # async fn run() -> converse::Result<()> {
//! let config = ChatConfig::new().with_api_key("app-...");
//! let mut widget = ChatWidget::new(config.clone(), HttpTransport::new(&config)?);
//! widget.open();
//! widget.set_input("What does my policy cover?").await;
//! let mut renderer = PlainTextRenderer::new();
//! widget.submit(&mut renderer).await;
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod format;
pub mod observability;
pub mod render;
pub mod speech;
pub mod sse;
pub mod types;

// Re-exports
pub use client::{API_KEY_ENV, ByteStream, HttpTransport, Transport};
pub use error::{CONNECTION_FAILED_REASON, Error, Result};
pub use format::{Formatter, InlineListBreaks, TextFixup, escape_html, format_markup, plain_markup};
pub use observability::register_biometrics;
pub use render::{MarkupRenderer, PlainTextRenderer, Renderer};
pub use speech::{SPEECH_UNSUPPORTED, SpeechEvent, SpeechRecognizer, VoiceInput};
pub use sse::{FrameDecoder, process_sse};
pub use types::*;
