//! Structured tracing spans carrying chat-specific context (spec.md §9):
//! correlates logs across an operation without ever logging message
//! content.

use tracing::{Level, Span, span};

/// Trace context for a single Dispatcher operation.
#[derive(Debug, Clone, Default)]
pub struct ChatTraceContext {
    pub operation: Option<String>,
    pub chat_id: Option<String>,
    pub user_id: Option<String>,
    pub message_id: Option<String>,
}

impl ChatTraceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Builds a span carrying every attribute that was set. Message
    /// `content` is never attached here — only identifiers.
    pub fn into_span(self) -> Span {
        let operation = self.operation.as_deref().unwrap_or("unknown");
        span!(
            Level::INFO,
            "chat.operation",
            operation = operation,
            chat_id = self.chat_id.as_deref(),
            user_id = self.user_id.as_deref(),
            message_id = self.message_id.as_deref(),
        )
    }
}

/// Initializes the global tracing subscriber (spec.md §9): `RUST_LOG`-driven
/// filtering, with an optional structured-JSON mode for production.
pub fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
