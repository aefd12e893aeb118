//! UI-facing operations of the chat widget.
//!
//! The widget is what a presentation layer talks to.  It creates the session lazily, tracks
//! whether the chat window is open, and routes voice input into the input buffer.  Pointer
//! events are injected by the host rather than discovered, so the widget never inspects the
//! environment it is embedded in.

use std::sync::Arc;

use tracing::debug;

use crate::chat::config::ChatConfig;
use crate::chat::conversation::{Conversation, ExchangeOutcome, SharedSession};
use crate::chat::session::ChatSession;
use crate::client::Transport;
use crate::error::Result;
use crate::format::Formatter;
use crate::render::Renderer;
use crate::speech::{SpeechEvent, SpeechRecognizer, VoiceInput};

/// Where a pointer press landed, as reported by the host.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PointerEvent {
    /// Inside the chat window.
    Inside,
    /// Anywhere outside the chat window and its toggle button.
    Outside,
    /// On the button that opens and closes the window.
    ToggleButton,
}

/// A floating chat widget.
pub struct ChatWidget<T: Transport> {
    config: ChatConfig,
    formatter: Formatter,
    transport: Arc<T>,
    conversation: Option<Conversation<T>>,
    open: bool,
    voice: VoiceInput,
}

impl<T: Transport> ChatWidget<T> {
    /// Creates a closed widget with no session yet and no voice input.
    pub fn new(config: ChatConfig, transport: T) -> Self {
        Self {
            config,
            formatter: Formatter::new(),
            transport: Arc::new(transport),
            conversation: None,
            open: false,
            voice: VoiceInput::unavailable(),
        }
    }

    /// Use `recognizer` for voice input.
    pub fn with_speech(mut self, recognizer: Box<dyn SpeechRecognizer>) -> Self {
        self.voice = VoiceInput::new(recognizer);
        self
    }

    /// Use `formatter` for assistant messages.  Applies to sessions created afterwards.
    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Opens the window, creating the session on first use.
    pub fn open(&mut self) {
        self.conversation();
        self.open = true;
    }

    /// Closes the window.  The conversation is kept.
    pub fn close(&mut self) {
        self.open = false;
    }

    /// Opens a closed window or closes an open one.
    pub fn toggle(&mut self) {
        if self.open {
            self.close();
        } else {
            self.open();
        }
    }

    /// Reacts to a pointer press reported by the host.
    pub fn on_pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Outside if self.open => {
                debug!("pointer outside the chat window; closing");
                self.close();
            }
            PointerEvent::ToggleButton => self.toggle(),
            PointerEvent::Inside | PointerEvent::Outside => {}
        }
    }

    /// The conversation, created on first use.
    pub fn conversation(&mut self) -> &Conversation<T> {
        let config = &self.config;
        let formatter = &self.formatter;
        let transport = &self.transport;
        self.conversation.get_or_insert_with(|| {
            let session = ChatSession::new(config).with_formatter(formatter.clone());
            Conversation::new(Arc::clone(transport), session)
        })
    }

    /// A handle to the session, created on first use.
    pub fn session(&mut self) -> SharedSession {
        self.conversation().session()
    }

    /// Replaces the input buffer.
    pub async fn set_input(&mut self, input: impl Into<String>) {
        self.session().lock().await.set_input(input);
    }

    /// The input buffer.
    pub async fn input(&mut self) -> String {
        self.session().lock().await.input().to_string()
    }

    /// Submits the input buffer and streams the answer to `renderer`.
    pub async fn submit(&mut self, renderer: &mut dyn Renderer) -> ExchangeOutcome {
        self.conversation().submit_input(renderer).await
    }

    /// Resets the conversation.  Does nothing if no session exists yet.
    pub async fn reset(&mut self) {
        if let Some(conversation) = &self.conversation {
            conversation.reset().await;
        }
    }

    pub fn is_listening(&self) -> bool {
        self.voice.is_listening()
    }

    /// Turns voice input on or off and returns whether it is now listening.
    ///
    /// Without a recognizer this fails with a capability error whose text is meant to be shown
    /// to the user directly; the transcript is not touched.
    pub fn toggle_voice(&mut self) -> Result<bool> {
        self.voice.toggle()
    }

    /// Applies one speech event.  Transcripts are appended to the input buffer.
    pub async fn handle_speech(&mut self, event: SpeechEvent) {
        if let Some(text) = self.voice.handle(event) {
            self.session().lock().await.append_input(&text);
        }
    }

    /// Applies every speech event queued so far.
    pub async fn poll_speech(&mut self) {
        while let Some(event) = self.voice.try_next_event() {
            self.handle_speech(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;
    use crate::client::ByteStream;
    use crate::types::ChatRequest;

    struct Silent;

    #[async_trait::async_trait]
    impl Transport for Silent {
        async fn open(&self, _: &ChatRequest) -> Result<ByteStream> {
            Ok(Box::pin(stream::empty::<Result<bytes::Bytes>>()))
        }
    }

    fn widget() -> ChatWidget<Silent> {
        ChatWidget::new(ChatConfig::new(), Silent)
    }

    #[test]
    fn session_is_created_lazily() {
        let mut widget = widget();
        assert!(widget.conversation.is_none());
        widget.open();
        assert!(widget.conversation.is_some());
        assert!(widget.is_open());
    }

    #[test]
    fn pointer_events() {
        let mut widget = widget();
        widget.on_pointer(PointerEvent::Outside);
        assert!(!widget.is_open());
        widget.on_pointer(PointerEvent::ToggleButton);
        assert!(widget.is_open());
        widget.on_pointer(PointerEvent::Inside);
        assert!(widget.is_open());
        widget.on_pointer(PointerEvent::Outside);
        assert!(!widget.is_open());
        assert!(widget.conversation.is_some());
        widget.on_pointer(PointerEvent::ToggleButton);
        widget.on_pointer(PointerEvent::ToggleButton);
        assert!(!widget.is_open());
    }

    #[test]
    fn voice_without_recognizer() {
        let mut widget = widget();
        let err = widget.toggle_voice().unwrap_err();
        assert!(err.is_capability_unavailable());
        assert!(!widget.is_listening());
    }

    #[tokio::test]
    async fn input_buffer_round_trip() {
        let mut widget = widget();
        widget.set_input("hello").await;
        assert_eq!(widget.input().await, "hello");
        widget.reset().await;
        assert_eq!(widget.input().await, "");
    }
}
