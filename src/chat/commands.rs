//! Slash command parsing for the terminal front end.
//!
//! Lines starting with `/` control the widget and are never sent to the backend.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Reset the conversation to its welcome state.
    Reset,

    /// Toggle voice input.
    Voice,

    /// Open the widget.
    Open,

    /// Close the widget without discarding the conversation.
    Close,

    /// Show the backend conversation id.
    Session,

    /// Print the transcript.
    Transcript,

    /// Print the markup of the last message.
    Html,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it should be submitted
/// as a query.
///
/// # Examples
///
/// ```
/// # use converse::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/reset").is_some());
/// assert!(parse_command("What does my policy cover?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "reset" | "clear" => no_argument(ChatCommand::Reset, &command, argument),
        "voice" | "mic" => no_argument(ChatCommand::Voice, &command, argument),
        "open" => no_argument(ChatCommand::Open, &command, argument),
        "close" => no_argument(ChatCommand::Close, &command, argument),
        "session" => no_argument(ChatCommand::Session, &command, argument),
        "transcript" | "history" => no_argument(ChatCommand::Transcript, &command, argument),
        "html" => no_argument(ChatCommand::Html, &command, argument),
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn no_argument(command: ChatCommand, name: &str, argument: Option<&str>) -> ChatCommand {
    match argument {
        None => command,
        Some(_) => ChatCommand::Invalid(format!("/{name} takes no arguments")),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /reset                 Start over (alias /clear); abandons a pending answer
  /voice                 Toggle voice input
  /open                  Open the chat window
  /close                 Close the chat window (the conversation is kept)
  /session               Show the conversation id
  /transcript            Print the whole transcript
  /html                  Print the markup of the last message
  /help                  Show this help message
  /quit                  Exit the chat

Press Ctrl+C while an answer is streaming to abandon it and reset."#
}
