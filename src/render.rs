//! Output rendering for chat exchanges.
//!
//! A [`Renderer`] is told about each step of an exchange as the session applies it.  The
//! session owns the state; renderers only display it.  [`PlainTextRenderer`] writes the raw
//! answer text to a terminal, [`MarkupRenderer`] keeps the latest display-safe markup for a
//! host that embeds it.

use std::io::{self, Stdout, Write};

use crate::types::{Message, Role};

/// ANSI escape code for dim text (used for informational lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the user label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Receives the visible steps of an exchange.
pub trait Renderer: Send {
    /// The first response bytes arrived and an assistant message was opened.
    fn start_response(&mut self) {}

    /// The open assistant message changed.
    ///
    /// `message` carries the full text and markup so far; renderers that print incrementally
    /// track how much they have already shown.
    fn update_response(&mut self, message: &Message);

    /// The exchange ended and the assistant message was closed.
    fn finish_response(&mut self);

    /// The exchange failed; `error` is the text appended to the transcript.
    fn print_error(&mut self, error: &str);

    /// Prints an informational line outside of any exchange.
    fn print_info(&mut self, info: &str);

    /// The user abandoned the exchange.
    fn print_interrupted(&mut self) {
        self.print_info("[interrupted; conversation reset]");
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// Streams the raw assistant text to stdout as it grows.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    printed: usize,
    in_response: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            printed: 0,
            in_response: false,
        }
    }

    /// Prints one closed transcript entry with its role label.
    pub fn print_message(&mut self, message: &Message) {
        let (color, label) = match message.role() {
            Role::User => (ANSI_GREEN, "You"),
            Role::Assistant => (ANSI_CYAN, "Assistant"),
            Role::Error => (ANSI_RED, "Error"),
        };
        if self.use_color {
            println!("{color}{label}:{ANSI_RESET} {}", message.text());
        } else {
            println!("{label}: {}", message.text());
        }
        self.flush();
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn end_line(&mut self) {
        if self.in_response {
            println!();
            self.in_response = false;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_response(&mut self) {
        self.printed = 0;
        self.in_response = true;
        if self.use_color {
            print!("{ANSI_CYAN}Assistant:{ANSI_RESET} ");
        } else {
            print!("Assistant: ");
        }
        self.flush();
    }

    fn update_response(&mut self, message: &Message) {
        // Assistant text only ever grows, so `printed` stays on a char boundary.
        if let Some(delta) = message.text().get(self.printed..) {
            print!("{delta}");
            self.printed = message.text().len();
            self.flush();
        }
    }

    fn finish_response(&mut self) {
        self.end_line();
        self.printed = 0;
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.end_line();
        if self.use_color {
            eprintln!("{ANSI_RED}Error:{ANSI_RESET} {error}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.end_line();
        if self.use_color {
            println!("{ANSI_DIM}{info}{ANSI_RESET}");
        } else {
            println!("{info}");
        }
        self.flush();
    }
}

/// Keeps the most recent markup of the open assistant message.
///
/// Each update replaces the previous markup wholesale, which is how an embedding host should
/// display it: the formatter re-renders the full buffer on every delta.
#[derive(Debug, Default, Clone)]
pub struct MarkupRenderer {
    markup: String,
    updates: usize,
    responses: usize,
    errors: Vec<String>,
    info: Vec<String>,
}

impl MarkupRenderer {
    /// Creates an empty renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Markup of the latest (or current) assistant message.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Number of updates received for the latest response.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Number of responses that finished.
    pub fn responses(&self) -> usize {
        self.responses
    }

    /// Errors reported so far.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Informational lines reported so far.
    pub fn info(&self) -> &[String] {
        &self.info
    }
}

impl Renderer for MarkupRenderer {
    fn start_response(&mut self) {
        self.markup.clear();
        self.updates = 0;
    }

    fn update_response(&mut self, message: &Message) {
        self.markup = message.markup().to_string();
        self.updates += 1;
    }

    fn finish_response(&mut self) {
        self.responses += 1;
    }

    fn print_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }

    fn print_info(&mut self, info: &str) {
        self.info.push(info.to_string());
    }
}
