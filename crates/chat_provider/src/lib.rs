//! Minimal provider-agnostic contract for executing a single chat turn.
//!
//! This crate intentionally defines only the shared turn lifecycle and the
//! render-mode selection carried with each request. It excludes provider
//! transport details, protocol payloads, and message persistence concerns.

use std::fmt;
use std::sync::{atomic::AtomicBool, Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier for one provider turn.
pub type TurnId = u64;

/// Shared cancellation flag for a turn.
pub type CancelSignal = Arc<AtomicBool>;

/// Error returned while constructing/configuring a provider before any turn starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Render-mode selection carried with each turn request.
///
/// The upstream model family supports two generation strategies: left-to-right
/// token emission, where each frame is a delta to append, and denoising-style
/// generation, where each frame is a fuller draft of the entire answer that
/// supersedes prior content. The mode is captured when a turn starts and never
/// changes mid-stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    #[default]
    Streaming,
    Diffusing,
}

impl ChatMode {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "streaming" => Self::Streaming,
            "diffusing" => Self::Diffusing,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Diffusing => "diffusing",
        }
    }

    /// Returns the other mode; used by mode-toggle surfaces.
    #[must_use]
    pub fn toggled(&self) -> Self {
        match self {
            Self::Streaming => Self::Diffusing,
            Self::Diffusing => Self::Streaming,
        }
    }
}

/// Provider-neutral model-facing conversation history item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnMessage {
    UserText { text: String },
    AssistantText { text: String },
}

impl TurnMessage {
    /// Returns the text carried by this history item.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::UserText { text } | Self::AssistantText { text } => text,
        }
    }
}

/// Input required to start a provider turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub turn_id: TurnId,
    pub messages: Vec<TurnMessage>,
    pub mode: ChatMode,
    pub max_tokens: u32,
    /// Tool definitions forwarded verbatim to the endpoint. Empty means tools
    /// are disabled for this turn; the client never mediates tool execution.
    pub tools: Vec<Value>,
}

/// Provider-emitted lifecycle event for a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    Started { turn_id: TurnId },
    /// One decoded content frame. In streaming mode the text is a delta to
    /// append; in diffusing mode it is a full replacement of the answer so far.
    Frame { turn_id: TurnId, text: String },
    /// A malformed stream line was skipped. Non-fatal side-channel signal; the
    /// turn stays open.
    DecodeSkipped { turn_id: TurnId, reason: String },
    Finished { turn_id: TurnId },
    Failed { turn_id: TurnId, error: String },
    Cancelled { turn_id: TurnId },
}

impl TurnEvent {
    /// Returns the turn identifier associated with this event.
    #[must_use]
    pub fn turn_id(&self) -> TurnId {
        match self {
            Self::Started { turn_id }
            | Self::Frame { turn_id, .. }
            | Self::DecodeSkipped { turn_id, .. }
            | Self::Finished { turn_id }
            | Self::Failed { turn_id, .. }
            | Self::Cancelled { turn_id } => *turn_id,
        }
    }

    /// Returns true when this event terminates the turn lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Immutable metadata describing a turn provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Provider interface for executing one turn request.
pub trait TurnProvider: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Executes a turn request and emits lifecycle events in provider order.
    ///
    /// Exactly one terminal event must be emitted per turn; frames observed
    /// after the cancel signal is raised must not be emitted as content.
    fn run(
        &self,
        req: TurnRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(TurnEvent),
    ) -> Result<(), String>;
}
