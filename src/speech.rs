//! Optional voice input.
//!
//! Speech recognition is a host capability.  A host that has one implements
//! [`SpeechRecognizer`]; recognised text arrives as [`SpeechEvent`]s on a channel and is
//! appended to the session's input buffer.  Without a recognizer, turning voice input on
//! reports a user-facing notice and changes nothing else.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Notice shown when voice input is requested but no recognizer exists.
pub const SPEECH_UNSUPPORTED: &str = "Speech recognition is not supported on this device.";

/// Something a speech recognizer reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// A final transcript fragment.
    Transcript(String),
    /// Recognition failed; listening stops.
    Error(String),
    /// Recognition ended on its own; listening stops.
    Ended,
}

/// A host speech recognizer.
pub trait SpeechRecognizer: Send {
    /// Start listening, sending results to `events` until stopped.
    fn start(&mut self, events: mpsc::UnboundedSender<SpeechEvent>) -> Result<()>;

    /// Stop listening.  Must be safe to call when not listening.
    fn stop(&mut self);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Listening {
    Off,
    On,
    /// Asked to stop; transcripts still arrive until the recognizer reports `Ended`.
    Stopping,
}

/// Tracks whether voice input is on and routes recognizer events.
pub struct VoiceInput {
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    listening: Listening,
    events_tx: mpsc::UnboundedSender<SpeechEvent>,
    events_rx: mpsc::UnboundedReceiver<SpeechEvent>,
}

impl VoiceInput {
    /// Voice input backed by `recognizer`.
    pub fn new(recognizer: Box<dyn SpeechRecognizer>) -> Self {
        let mut voice = Self::unavailable();
        voice.recognizer = Some(recognizer);
        voice
    }

    /// Voice input on a host without speech recognition.
    pub fn unavailable() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            recognizer: None,
            listening: Listening::Off,
            events_tx,
            events_rx,
        }
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.listening == Listening::On
    }

    /// Turn listening on or off and return the new state.
    ///
    /// Fails with a capability error when there is no recognizer.  A recognizer that fails to
    /// start leaves listening off; that is logged, not returned.  Turning listening off still
    /// accepts the transcripts the recognizer flushes before it reports `Ended`.
    pub fn toggle(&mut self) -> Result<bool> {
        let Some(recognizer) = self.recognizer.as_mut() else {
            return Err(Error::capability_unavailable(SPEECH_UNSUPPORTED));
        };
        if self.listening == Listening::On {
            self.listening = Listening::Stopping;
            recognizer.stop();
        } else {
            match recognizer.start(self.events_tx.clone()) {
                Ok(()) => self.listening = Listening::On,
                Err(err) => warn!(error = %err, "speech recognizer failed to start"),
            }
        }
        Ok(self.is_listening())
    }

    /// Apply one event, returning text to append to the input buffer.
    pub fn handle(&mut self, event: SpeechEvent) -> Option<String> {
        match event {
            SpeechEvent::Transcript(text) if self.listening != Listening::Off => Some(text),
            SpeechEvent::Transcript(_) => {
                debug!("dropping transcript received while not listening");
                None
            }
            SpeechEvent::Error(message) => {
                warn!(error = %message, "speech recognition failed");
                self.stop();
                None
            }
            SpeechEvent::Ended => {
                self.stop();
                None
            }
        }
    }

    /// The next queued event, if any, without waiting.
    pub fn try_next_event(&mut self) -> Option<SpeechEvent> {
        self.events_rx.try_recv().ok()
    }

    fn stop(&mut self) {
        if self.listening == Listening::On
            && let Some(recognizer) = self.recognizer.as_mut()
        {
            recognizer.stop();
        }
        self.listening = Listening::Off;
    }
}

impl Drop for VoiceInput {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for VoiceInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceInput")
            .field("available", &self.is_available())
            .field("listening", &self.listening)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct Scripted {
        fail_start: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SpeechRecognizer for Scripted {
        fn start(&mut self, events: mpsc::UnboundedSender<SpeechEvent>) -> Result<()> {
            self.calls.lock().unwrap().push("start");
            if self.fail_start {
                return Err(Error::capability_unavailable("microphone busy"));
            }
            events
                .send(SpeechEvent::Transcript("hello".to_string()))
                .unwrap();
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().push("stop");
        }
    }

    #[test]
    fn unavailable_reports_notice() {
        let mut voice = VoiceInput::unavailable();
        let err = voice.toggle().unwrap_err();
        assert!(err.is_capability_unavailable());
        assert_eq!(err.transcript_reason(), SPEECH_UNSUPPORTED);
        assert!(!voice.is_listening());
    }

    #[test]
    fn toggle_and_receive() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut voice = VoiceInput::new(Box::new(Scripted {
            fail_start: false,
            calls: calls.clone(),
        }));
        assert!(voice.toggle().unwrap());
        let event = voice.try_next_event().unwrap();
        assert_eq!(voice.handle(event), Some("hello".to_string()));
        assert!(!voice.toggle().unwrap());
        assert_eq!(*calls.lock().unwrap(), ["start", "stop"]);
    }

    #[test]
    fn error_and_end_stop_listening() {
        let mut voice = VoiceInput::new(Box::new(Scripted::default()));
        voice.toggle().unwrap();
        assert_eq!(voice.handle(SpeechEvent::Error("no-speech".to_string())), None);
        assert!(!voice.is_listening());

        voice.toggle().unwrap();
        assert_eq!(voice.handle(SpeechEvent::Ended), None);
        assert!(!voice.is_listening());
        assert_eq!(voice.handle(SpeechEvent::Transcript("late".to_string())), None);
    }

    /// Flushes its last result when stopped, the way browser recognizers do.
    #[derive(Default)]
    struct Flushing {
        events: Option<mpsc::UnboundedSender<SpeechEvent>>,
    }

    impl SpeechRecognizer for Flushing {
        fn start(&mut self, events: mpsc::UnboundedSender<SpeechEvent>) -> Result<()> {
            self.events = Some(events);
            Ok(())
        }

        fn stop(&mut self) {
            if let Some(events) = self.events.take() {
                events
                    .send(SpeechEvent::Transcript("my policy".to_string()))
                    .unwrap();
                events.send(SpeechEvent::Ended).unwrap();
            }
        }
    }

    #[test]
    fn transcript_flushed_on_stop_is_kept() {
        let mut voice = VoiceInput::new(Box::new(Flushing::default()));
        assert!(voice.toggle().unwrap());
        assert!(!voice.toggle().unwrap());
        assert!(!voice.is_listening());

        let mut texts = Vec::new();
        while let Some(event) = voice.try_next_event() {
            texts.extend(voice.handle(event));
        }
        assert_eq!(texts, ["my policy"]);
        assert_eq!(voice.handle(SpeechEvent::Transcript("late".to_string())), None);
    }

    #[test]
    fn failed_start_stays_off() {
        let mut voice = VoiceInput::new(Box::new(Scripted {
            fail_start: true,
            calls: Arc::default(),
        }));
        assert!(!voice.toggle().unwrap());
        assert!(!voice.is_listening());
    }
}
