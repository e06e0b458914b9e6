//! Transport-only dLLM API client primitives.
//!
//! This crate owns request building, response decoding, and stream parsing
//! for the hosted chat-completions endpoint only. It intentionally contains
//! no conversation state and no rendering coupling.
//!
//! Stream normalization recognizes both the re-wrapped `{content, error}`
//! event shape and raw upstream delta chunks; malformed lines surface as
//! [`ChatStreamEvent::Invalid`] for explicit caller-side notification.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::{CancellationSignal, InceptionApiClient, KeyValidation};
pub use reqwest::StatusCode;
pub use config::{looks_like_api_key, InceptionApiConfig, DEFAULT_MODEL};
pub use error::{parse_error_message, status_annotation, InceptionApiError};
pub use events::ChatStreamEvent;
pub use payload::{CompletionsRequest, WireMessage, WireRole, DEFAULT_MAX_TOKENS};
pub use sse::SseStreamParser;
pub use url::normalize_completions_url;
