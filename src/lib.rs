//! Chat-client core for dLLM endpoints with two render modes.
//!
//! Invariant: at most one assistant message is open at a time — submits are
//! rejected synchronously while a turn is in flight, and no event handler
//! returns leaving the open message streaming after a terminal event.
//!
//! # Overview
//! - [`ChatApp`] owns the message list, credential gate, mode selection, and
//!   the turn lifecycle state machine.
//! - [`TurnRuntime`] drives one provider turn at a time on a worker thread
//!   and applies its events to the app strictly in arrival order.
//! - [`reconcile`] applies each content frame with the append (streaming) or
//!   replace (diffusing) policy captured at submit time.
//! - [`ChatConfig`] bridges the persisted mode/key preferences into
//!   per-turn request knobs.
//!
//! Transport, stream decoding, and the provider seam live in the workspace
//! crates `inception_api`, `chat_provider`, and `chat_provider_inception`.

pub mod app;
pub mod config;
pub mod providers;
pub mod reconcile;
pub mod runtime;
pub mod store;

pub use app::{ChatApp, CredentialState, HostOps, SubmitError, TurnPhase};
pub use chat_provider::ChatMode;
pub use config::{web_search_tool_definition, ChatConfig, DEFAULT_MAX_TOKENS};
pub use providers::{provider_for_id, provider_from_env, DEFAULT_PROVIDER_ID};
pub use reconcile::reconcile;
pub use runtime::{EventNotifier, TurnRuntime, TurnRuntimeConfig, ERROR_TURN_ALREADY_ACTIVE};
pub use store::{Message, MessageId, MessageStore, Role};
