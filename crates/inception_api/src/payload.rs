use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default token budget for one completion request.
pub const DEFAULT_MAX_TOKENS: u32 = 800;

/// Wire role for one conversation history item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    User,
    Assistant,
}

/// One conversation history item as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: WireRole,
    pub content: String,
}

impl WireMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::Assistant,
            content: content.into(),
        }
    }
}

/// Canonical request payload shape for the chat-completions endpoint.
///
/// `diffusing` selects the denoising generation strategy upstream; it is only
/// serialized when set so streaming-mode payloads match the plain completions
/// shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionsRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub max_tokens: u32,
    /// Default: true.
    #[serde(default = "default_true")]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub diffusing: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
}

fn default_true() -> bool {
    true
}

impl CompletionsRequest {
    pub fn new(model: impl Into<String>, messages: Vec<WireMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: true,
            temperature: None,
            diffusing: false,
            tools: Vec::new(),
        }
    }

    /// Drops history items with empty content; the endpoint rejects blank
    /// turns and partially-built placeholders must never leak into requests.
    pub fn retain_non_empty_messages(mut self) -> Self {
        self.messages
            .retain(|message| !message.content.trim().is_empty());
        self
    }
}
