use converse::chat::ChatConfig;
use converse::{
    ChatRequest, Formatter, HttpTransport, InlineListBreaks, Result, Transport, process_sse,
};
use futures::StreamExt;
use tokio::pin;

#[tokio::main]
async fn main() -> Result<()> {
    // Create a transport using the API key from the environment variable CONVERSE_API_KEY
    let config = ChatConfig::new();
    let transport = HttpTransport::new(&config)?;

    // One request, outside of any session
    let request = ChatRequest::new("What kinds of insurance do you offer?", "", &config.user);
    let body = transport.open(&request).await?;

    // Decode the raw body into frames ourselves
    let frames = process_sse(body);
    pin!(frames);
    let formatter = Formatter::new().with_fixup(InlineListBreaks);
    let mut conversation_id = None;
    let mut answer = String::new();

    println!("Raw frames:");
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(frame) => {
                if let Some(id) = frame.session_id {
                    println!("=== conversation {id} ===");
                    conversation_id.get_or_insert(id);
                }
                if let Some(delta) = frame.answer_delta {
                    print!("{delta}");
                    answer.push_str(&delta);
                }
            }
            // Malformed lines are reported but the stream goes on
            Err(err) if err.is_frame_decode() => eprintln!("\n[skipped frame: {err}]"),
            Err(err) => {
                eprintln!("\nError: {}", err.transcript_reason());
                break;
            }
        }
    }

    println!("\n\n=== Markup ===");
    println!("{}", formatter.format(&answer));
    if let Some(id) = conversation_id {
        println!("\nContinue this conversation by sending conversation_id {id}");
    }
    Ok(())
}
