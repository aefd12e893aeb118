//! Core chat session state.
//!
//! `ChatSession` is a state machine with no I/O of its own.  A submission returns an
//! [`Exchange`] tagged with a generation number; everything that later arrives for that
//! exchange (the start of the response, frames, completion, failure) is applied with the same
//! generation.  `reset` bumps the generation, so output from an abandoned exchange is
//! recognised as stale and discarded instead of landing in the fresh transcript.

use tracing::{debug, warn};

use crate::chat::config::ChatConfig;
use crate::error::{Error, Result};
use crate::format::{Formatter, plain_markup};
use crate::observability::{
    SESSION_REJECTED_SUBMITS, SESSION_RESETS, SESSION_SUBMITS, STREAM_STALE_FRAMES,
};
use crate::types::{ChatRequest, Message, Role, StreamFrame};

/// Where a session is in its request cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for a submission.
    Idle,

    /// A request is out; no response bytes have arrived yet.
    Sending {
        /// Generation of the in-flight exchange.
        generation: u64,
    },

    /// Response bytes are arriving and feed the open assistant message.
    Streaming {
        /// Generation of the in-flight exchange.
        generation: u64,
    },
}

/// A submitted query, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    /// Generation that every later update for this exchange must carry.
    pub generation: u64,
    /// The request to send.
    pub request: ChatRequest,
}

/// One conversation with the assistant backend.
#[derive(Debug, Clone)]
pub struct ChatSession {
    user: String,
    welcome_message: Option<String>,
    formatter: Formatter,
    session_id: String,
    transcript: Vec<Message>,
    input: String,
    state: SessionState,
    generation: u64,
}

impl ChatSession {
    /// Creates a session in its initial welcome state.
    pub fn new(config: &ChatConfig) -> Self {
        let mut session = Self {
            user: config.user.clone(),
            welcome_message: config.welcome_message.clone(),
            formatter: Formatter::new(),
            session_id: String::new(),
            transcript: Vec::new(),
            input: String::new(),
            state: SessionState::Idle,
            generation: 0,
        };
        session.transcript = session.initial_transcript();
        session
    }

    /// Replaces the formatter used for assistant messages.
    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        for message in &mut self.transcript {
            if message.role() == Role::Assistant {
                let markup = self.formatter.format(message.text());
                message.set_markup(markup);
            }
        }
        self
    }

    /// The backend-assigned conversation id, or `""` before the first exchange.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The transcript in display order.
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// The current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True from submission until the exchange completes or fails.
    pub fn is_pending(&self) -> bool {
        self.state != SessionState::Idle
    }

    /// The assistant message still receiving deltas, if any.
    pub fn open_message(&self) -> Option<&Message> {
        self.transcript.last().filter(|message| message.is_open())
    }

    /// The pending input buffer.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replaces the pending input buffer.
    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Appends to the pending input buffer (used by voice input).
    pub fn append_input(&mut self, text: &str) {
        self.input.push_str(text);
    }

    /// Submits the pending input buffer.
    pub fn submit_input(&mut self) -> Result<Exchange> {
        let query = self.input.clone();
        self.submit(&query)
    }

    /// Submits `query`.
    ///
    /// Rejected without any change when a response is pending or when `query` is blank.
    /// Otherwise appends the user message, clears the input buffer and moves to `Sending`.
    pub fn submit(&mut self, query: &str) -> Result<Exchange> {
        if self.is_pending() {
            SESSION_REJECTED_SUBMITS.click();
            return Err(Error::validation("a response is still pending"));
        }
        if query.trim().is_empty() {
            SESSION_REJECTED_SUBMITS.click();
            return Err(Error::validation("query is empty"));
        }
        SESSION_SUBMITS.click();

        self.transcript.push(Message::closed(
            Role::User,
            query.to_string(),
            plain_markup(query),
        ));
        self.input.clear();
        self.generation += 1;
        self.state = SessionState::Sending {
            generation: self.generation,
        };
        Ok(Exchange {
            generation: self.generation,
            request: ChatRequest::new(query, self.session_id.clone(), self.user.clone()),
        })
    }

    /// True if `generation` is the exchange currently in flight.
    pub fn is_current(&self, generation: u64) -> bool {
        match self.state {
            SessionState::Idle => false,
            SessionState::Sending { generation: g } | SessionState::Streaming { generation: g } => {
                g == generation
            }
        }
    }

    /// Records that response bytes have started to arrive.
    ///
    /// Opens the empty assistant message on the first call for an exchange and returns true;
    /// later calls, and calls for a stale generation, return false.
    pub fn begin_response(&mut self, generation: u64) -> bool {
        if self.state != (SessionState::Sending { generation }) {
            return false;
        }
        self.transcript.push(Message::open(generation));
        self.state = SessionState::Streaming { generation };
        true
    }

    /// Applies one decoded frame.  Returns false if the frame was discarded as stale.
    pub fn apply_frame(&mut self, generation: u64, frame: StreamFrame) -> bool {
        if !self.is_current(generation) {
            STREAM_STALE_FRAMES.click();
            debug!(generation, "discarding frame from an abandoned exchange");
            return false;
        }
        self.begin_response(generation);

        if let Some(id) = frame.session_id {
            if self.session_id.is_empty() {
                debug!(conversation_id = %id, "adopted conversation id");
                self.session_id = id;
            } else if id != self.session_id {
                warn!(
                    current = %self.session_id,
                    received = %id,
                    "ignoring conversation id change"
                );
            }
        }

        if let Some(delta) = frame.answer_delta
            && let Some(message) = self
                .transcript
                .last_mut()
                .filter(|message| message.generation() == Some(generation))
        {
            message.push_delta(&delta);
            // Re-render the whole buffer: list and bold fixes may depend on later text.
            let markup = self.formatter.format(message.text());
            message.set_markup(markup);
        }
        true
    }

    /// Completes the exchange, closing the open assistant message.
    pub fn finish(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.close_open_message();
        self.state = SessionState::Idle;
        true
    }

    /// Ends the exchange with an error message.
    ///
    /// Any partial assistant message stays in the transcript.
    pub fn fail(&mut self, generation: u64, error: &Error) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.close_open_message();
        let reason = error.transcript_reason();
        let markup = plain_markup(&reason);
        self.transcript
            .push(Message::closed(Role::Error, reason, markup));
        self.state = SessionState::Idle;
        true
    }

    /// Returns to the initial welcome state and abandons any exchange in flight.
    pub fn reset(&mut self) {
        SESSION_RESETS.click();
        self.transcript = self.initial_transcript();
        self.session_id.clear();
        self.input.clear();
        self.generation += 1;
        self.state = SessionState::Idle;
    }

    fn close_open_message(&mut self) {
        if let Some(message) = self.transcript.last_mut() {
            message.close();
        }
    }

    fn initial_transcript(&self) -> Vec<Message> {
        self.welcome_message
            .iter()
            .map(|welcome| {
                Message::closed(
                    Role::Assistant,
                    welcome.clone(),
                    self.formatter.format(welcome),
                )
            })
            .collect()
    }
}
