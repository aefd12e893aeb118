//! Interactive terminal front end for the chat widget.
//!
//! # Usage
//!
//! ```bash
//! # The API key comes from the environment
//! export CONVERSE_API_KEY=app-...
//! converse-chat
//!
//! # Another backend, no welcome message
//! converse-chat --base-url https://chat.example.com/v1 --no-welcome
//!
//! # Disable colors (useful for piping output)
//! converse-chat --no-color
//! ```
//!
//! # Commands
//!
//! - `/help` - Show available commands
//! - `/reset` - Start the conversation over
//! - `/transcript` - Print the transcript
//! - `/quit` - Exit the application
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

use converse::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatWidget, ExchangeOutcome, help_text, parse_command,
};
use converse::{HttpTransport, PlainTextRenderer, Renderer, Role};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("converse-chat [OPTIONS]");
    let config = ChatConfig::from(args);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let transport = HttpTransport::new(&config)?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut widget = ChatWidget::new(config, transport);
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C while an answer streams abandons it.  At the prompt rustyline sees the key itself.
    let interrupt = Arc::new(Notify::new());
    let interrupt_clone = Arc::clone(&interrupt);
    ctrlc::set_handler(move || {
        interrupt_clone.notify_waiters();
    })?;

    println!("Converse Chat");
    println!("Type /help for commands, /quit to exit\n");
    widget.open();
    print_transcript(&mut widget, &mut renderer).await;

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                if let Some(cmd) = parse_command(&line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Reset => {
                            widget.reset().await;
                            renderer.print_info("Conversation reset.");
                            print_transcript(&mut widget, &mut renderer).await;
                        }
                        ChatCommand::Voice => match widget.toggle_voice() {
                            Ok(true) => renderer.print_info("Listening..."),
                            Ok(false) => renderer.print_info("Voice input off."),
                            Err(err) => renderer.print_error(&err.transcript_reason()),
                        },
                        ChatCommand::Open => {
                            widget.open();
                            renderer.print_info("Chat window open.");
                        }
                        ChatCommand::Close => {
                            widget.close();
                            renderer.print_info("Chat window closed; /open to continue.");
                        }
                        ChatCommand::Session => {
                            let session = widget.session();
                            let session = session.lock().await;
                            if session.session_id().is_empty() {
                                renderer.print_info("Conversation id: (none yet)");
                            } else {
                                renderer.print_info(&format!(
                                    "Conversation id: {}",
                                    session.session_id()
                                ));
                            }
                        }
                        ChatCommand::Transcript => {
                            print_transcript(&mut widget, &mut renderer).await;
                        }
                        ChatCommand::Html => {
                            let session = widget.session();
                            let session = session.lock().await;
                            match session.transcript().last() {
                                Some(message) => println!("{}", message.markup()),
                                None => renderer.print_info("(empty transcript)"),
                            }
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                if !widget.is_open() {
                    renderer.print_info("Chat window is closed; /open to continue.");
                    continue;
                }

                widget.set_input(line).await;
                let outcome = tokio::select! {
                    outcome = widget.submit(&mut renderer) => Some(outcome),
                    _ = interrupt.notified() => None,
                };
                match outcome {
                    Some(ExchangeOutcome::Rejected(err)) => {
                        renderer.print_info(&err.to_string());
                    }
                    Some(_) => {}
                    None => {
                        widget.reset().await;
                        renderer.print_interrupted();
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

async fn print_transcript(
    widget: &mut ChatWidget<HttpTransport>,
    renderer: &mut PlainTextRenderer,
) {
    let session = widget.session();
    let session = session.lock().await;
    if session.transcript().is_empty() {
        renderer.print_info("(empty transcript)");
    }
    for message in session.transcript() {
        if message.role() == Role::Error {
            renderer.print_error(message.text());
        } else {
            renderer.print_message(message);
        }
    }
}
