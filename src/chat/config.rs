//! Configuration types for the chat widget.
//!
//! This module provides CLI argument parsing via `arrrg` and the explicitly constructed
//! configuration object every session, transport and widget is built from.

use std::time::Duration;

use arrrg_derive::CommandLine;

/// Default base URL of the chat backend.
pub const DEFAULT_BASE_URL: &str = "http://api.next-agi.com/v1";

/// Default end-user identifier sent with every request.
pub const DEFAULT_USER: &str = "guest";

/// Default welcome message shown at the top of a fresh transcript.
pub const DEFAULT_WELCOME_MESSAGE: &str =
    "Welcome to our Insurance Assistant!\nHow can I help you today?";

/// Default total request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Command-line arguments for the converse-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the chat backend.
    #[arrrg(optional, "Base URL of the chat backend", "URL")]
    pub base_url: Option<String>,

    /// End-user identifier sent with every request.
    #[arrrg(optional, "End-user identifier (default: guest)", "USER")]
    pub user: Option<String>,

    /// Welcome message for fresh transcripts.
    #[arrrg(optional, "Welcome message shown after a reset", "TEXT")]
    pub welcome: Option<String>,

    /// Start transcripts empty.
    #[arrrg(flag, "Do not show a welcome message")]
    pub no_welcome: bool,

    /// Total request timeout in seconds; 0 disables the timeout.
    #[arrrg(optional, "Request timeout in seconds (default: 300, 0 = none)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat widget.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Base URL of the backend; requests go to `<base_url>/chat-messages`.
    pub base_url: String,

    /// Bearer credential.  `None` defers to the environment.
    pub api_key: Option<String>,

    /// End-user identifier sent with every request.
    pub user: String,

    /// Message shown at the top of a fresh transcript, if any.
    pub welcome_message: Option<String>,

    /// Total request timeout, if any.
    pub timeout: Option<Duration>,

    /// Whether to use ANSI colors and styles in terminal output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            user: DEFAULT_USER.to_string(),
            welcome_message: Some(DEFAULT_WELCOME_MESSAGE.to_string()),
            timeout: Some(DEFAULT_TIMEOUT),
            use_color: true,
        }
    }

    /// Sets the backend base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the end-user identifier.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Sets or clears the welcome message.
    pub fn with_welcome_message(mut self, welcome_message: Option<String>) -> Self {
        self.welcome_message = welcome_message;
        self
    }

    /// Sets or clears the request timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = ChatConfig::new();
        let welcome_message = if args.no_welcome {
            None
        } else {
            args.welcome.or(defaults.welcome_message)
        };
        let timeout = match args.timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.timeout,
        };

        ChatConfig {
            base_url: args.base_url.unwrap_or(defaults.base_url),
            api_key: None,
            user: args.user.unwrap_or(defaults.user),
            welcome_message,
            timeout,
            use_color: !args.no_color,
        }
    }
}
