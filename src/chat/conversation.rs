//! Async driver for a [`ChatSession`].
//!
//! A `Conversation` owns a transport and a shared session.  For each exchange it opens the
//! request, reads the body one chunk at a time, decodes frames and applies them to the session,
//! telling a [`Renderer`] about each visible change.  The session lock is only held between
//! reads, never across a transport await, so another task may `reset` the session while a
//! response is streaming.  The driver notices the reset after its next read and drops the body.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::chat::session::{ChatSession, Exchange};
use crate::client::Transport;
use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::sse::FrameDecoder;
use crate::types::StreamFrame;

/// A session shared between the driver and whoever else needs to read or reset it.
pub type SharedSession = Arc<Mutex<ChatSession>>;

/// How an exchange ended.
#[derive(Debug, Clone)]
pub enum ExchangeOutcome {
    /// The submission was rejected and nothing was sent.
    Rejected(Error),
    /// The response stream ended normally.
    Completed,
    /// The transport failed; the reason was appended to the transcript.
    Failed(Error),
    /// The session was reset while the exchange was in flight.
    Abandoned,
}

impl ExchangeOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExchangeOutcome::Completed)
    }
}

/// Drives exchanges for one session over one transport.
pub struct Conversation<T: Transport> {
    transport: Arc<T>,
    session: SharedSession,
}

impl<T: Transport> Conversation<T> {
    /// Creates a conversation over `transport`.
    pub fn new(transport: Arc<T>, session: ChatSession) -> Self {
        Self {
            transport,
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// A handle to the session.
    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    /// Submits `query` and streams the response.
    pub async fn submit(&self, query: &str, renderer: &mut dyn Renderer) -> ExchangeOutcome {
        let exchange = self.session.lock().await.submit(query);
        self.dispatch(exchange, renderer).await
    }

    /// Submits the session's input buffer and streams the response.
    pub async fn submit_input(&self, renderer: &mut dyn Renderer) -> ExchangeOutcome {
        let exchange = self.session.lock().await.submit_input();
        self.dispatch(exchange, renderer).await
    }

    /// Resets the session, abandoning any exchange in flight.
    pub async fn reset(&self) {
        self.session.lock().await.reset();
    }

    async fn dispatch(
        &self,
        exchange: Result<Exchange>,
        renderer: &mut dyn Renderer,
    ) -> ExchangeOutcome {
        match exchange {
            Ok(exchange) => self.send(exchange, renderer).await,
            Err(err) => {
                debug!(error = %err, "submission rejected");
                ExchangeOutcome::Rejected(err)
            }
        }
    }

    /// Sends a submitted exchange and applies its response to the session.
    pub async fn send(&self, exchange: Exchange, renderer: &mut dyn Renderer) -> ExchangeOutcome {
        let generation = exchange.generation;
        let mut body = match self.transport.open(&exchange.request).await {
            Ok(body) => body,
            Err(err) => return self.fail(generation, err, renderer).await,
        };

        let mut decoder = FrameDecoder::new();
        let mut started = false;
        loop {
            let next = body.next().await;
            let mut session = self.session.lock().await;
            if !session.is_current(generation) {
                debug!(generation, "exchange abandoned; dropping response body");
                return ExchangeOutcome::Abandoned;
            }
            match next {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    if session.begin_response(generation) {
                        started = true;
                        renderer.start_response();
                    }
                    for item in decoder.push(&chunk) {
                        apply(&mut session, generation, item, renderer);
                    }
                }
                Some(Err(err)) => {
                    drop(session);
                    return self.fail(generation, err, renderer).await;
                }
                None => {
                    for item in decoder.finish() {
                        apply(&mut session, generation, item, renderer);
                    }
                    session.finish(generation);
                    if started {
                        renderer.finish_response();
                    }
                    return ExchangeOutcome::Completed;
                }
            }
        }
    }

    async fn fail(
        &self,
        generation: u64,
        err: Error,
        renderer: &mut dyn Renderer,
    ) -> ExchangeOutcome {
        warn!(error = %err, "chat exchange failed");
        if self.session.lock().await.fail(generation, &err) {
            renderer.print_error(&err.transcript_reason());
            ExchangeOutcome::Failed(err)
        } else {
            ExchangeOutcome::Abandoned
        }
    }
}

fn apply(
    session: &mut ChatSession,
    generation: u64,
    item: Result<StreamFrame>,
    renderer: &mut dyn Renderer,
) {
    match item {
        Ok(frame) => {
            let has_delta = frame.answer_delta.is_some();
            if session.apply_frame(generation, frame)
                && has_delta
                && let Some(message) = session.open_message()
            {
                renderer.update_response(message);
            }
        }
        Err(err) => warn!(error = %err, "dropping malformed frame"),
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::stream;

    use super::*;
    use crate::chat::ChatConfig;
    use crate::client::ByteStream;
    use crate::render::MarkupRenderer;
    use crate::types::{ChatRequest, Role};

    struct Canned(Vec<&'static [u8]>);

    #[async_trait::async_trait]
    impl Transport for Canned {
        async fn open(&self, _: &ChatRequest) -> Result<ByteStream> {
            let chunks: Vec<Result<Bytes>> = self
                .0
                .iter()
                .map(|chunk| Ok(Bytes::from_static(chunk)))
                .collect();
            Ok(Box::pin(stream::iter(chunks)))
        }
    }

    fn conversation(chunks: Vec<&'static [u8]>) -> Conversation<Canned> {
        Conversation::new(Arc::new(Canned(chunks)), ChatSession::new(&ChatConfig::new()))
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let conversation = conversation(vec![
            b"data: {oops}\n",
            b"data: {\"answer\":\"fine\"}\n",
        ]);
        let mut renderer = MarkupRenderer::new();
        let outcome = conversation.submit("hi", &mut renderer).await;
        assert!(outcome.is_completed());
        let session = conversation.session();
        let session = session.lock().await;
        let last = session.transcript().last().unwrap();
        assert_eq!(last.role(), Role::Assistant);
        assert_eq!(last.text(), "fine");
        assert!(renderer.errors().is_empty());
    }

    #[tokio::test]
    async fn empty_body_adds_no_assistant_message() {
        let conversation = conversation(vec![]);
        let mut renderer = MarkupRenderer::new();
        assert!(conversation.submit("hi", &mut renderer).await.is_completed());
        let session = conversation.session();
        let session = session.lock().await;
        assert_eq!(session.transcript().len(), 2);
        assert!(!session.is_pending());
        assert_eq!(renderer.responses(), 0);
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let conversation = conversation(vec![b"data: {\"answer\":\"x\"}\n"]);
        let mut renderer = MarkupRenderer::new();
        let outcome = conversation.submit("  \n", &mut renderer).await;
        assert!(matches!(outcome, ExchangeOutcome::Rejected(ref e) if e.is_validation()));
        assert_eq!(conversation.session().lock().await.transcript().len(), 1);
    }
}
