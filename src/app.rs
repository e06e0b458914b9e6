use std::fmt;

use chat_provider::{ChatMode, TurnId, TurnMessage};

use crate::reconcile::reconcile;
use crate::store::{Message, MessageId, MessageStore, Role};

const CANCELLED_ANNOTATION: &str = "**Response cancelled by user.**";
const MAX_DECODE_NOTICES: usize = 32;

/// Lifecycle phase of the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    /// The request is in flight; no content frame has arrived yet.
    AwaitingFirstFrame { turn_id: TurnId },
    /// At least one content frame has been reconciled.
    Streaming { turn_id: TurnId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveTurn {
    turn_id: TurnId,
    assistant_id: MessageId,
    /// Mode captured at submit; never re-read mid-stream.
    mode: ChatMode,
}

/// Credential gate consulted synchronously at submit time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialState {
    key: Option<String>,
    validated: bool,
}

impl CredentialState {
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.key.is_some() && self.validated
    }
}

/// Why a submit was rejected without starting a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    EmptyInput,
    TurnAlreadyOpen,
    MissingCredentials,
    CredentialsNotValidated,
    Host(String),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "input is empty"),
            Self::TurnAlreadyOpen => write!(f, "a turn is already open"),
            Self::MissingCredentials => write!(f, "an API key is required"),
            Self::CredentialsNotValidated => write!(f, "the API key has not been validated"),
            Self::Host(error) => write!(f, "failed to start turn: {error}"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Host operations the app drives; implemented by the turn runtime.
pub trait HostOps {
    fn start_turn(
        &mut self,
        messages: Vec<TurnMessage>,
        mode: ChatMode,
    ) -> Result<TurnId, String>;
    fn cancel_turn(&mut self, turn_id: TurnId);
}

/// Explicit application state: message list, credential gate, mode
/// selection, and the turn lifecycle state machine. All mutation goes
/// through methods; there are no ambient singletons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatApp {
    store: MessageStore,
    phase: TurnPhase,
    mode: ChatMode,
    credentials: CredentialState,
    active: Option<ActiveTurn>,
    cancelling: Option<TurnId>,
    decode_notices: Vec<String>,
}

impl Default for ChatApp {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatApp {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: MessageStore::new(),
            phase: TurnPhase::Idle,
            mode: ChatMode::default(),
            credentials: CredentialState::default(),
            active: None,
            cancelling: None,
            decode_notices: Vec::new(),
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    #[must_use]
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// True while a turn is open or a cancel is still settling; submits are
    /// rejected synchronously while loading.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        !matches!(self.phase, TurnPhase::Idle) || self.cancelling.is_some()
    }

    #[must_use]
    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    /// Changes the render mode for future turns. Rejected while a turn is
    /// open; the mode is never mutable mid-stream.
    pub fn set_mode(&mut self, mode: ChatMode) -> bool {
        if self.is_loading() {
            return false;
        }
        self.mode = mode;
        true
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialState {
        &self.credentials
    }

    /// Stores a new API key; any previous validation outcome is discarded.
    pub fn set_api_key(&mut self, key: impl Into<String>) {
        let key = key.into();
        let trimmed = key.trim();
        self.credentials.key = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        };
        self.credentials.validated = false;
    }

    pub fn clear_api_key(&mut self) {
        self.credentials = CredentialState::default();
    }

    /// Records the outcome of the setup-time validation probe.
    pub fn set_key_validated(&mut self, valid: bool) {
        self.credentials.validated = valid && self.credentials.key.is_some();
    }

    /// Side-channel notifications for skipped stream lines, oldest first.
    #[must_use]
    pub fn decode_notices(&self) -> &[String] {
        &self.decode_notices
    }

    pub fn take_decode_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.decode_notices)
    }

    /// Submits one user turn: appends the user message and an open assistant
    /// placeholder, captures the mode, and starts the turn on the host.
    pub fn on_submit(
        &mut self,
        input: &str,
        host: &mut dyn HostOps,
    ) -> Result<TurnId, SubmitError> {
        let prompt = input.trim();
        if prompt.is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        if self.is_loading() {
            return Err(SubmitError::TurnAlreadyOpen);
        }
        if self.credentials.key.is_none() {
            return Err(SubmitError::MissingCredentials);
        }
        if !self.credentials.validated {
            return Err(SubmitError::CredentialsNotValidated);
        }

        let turn_messages = self.history_with_prompt(prompt);
        let mode = self.mode;

        let user_id = self.store.add(Role::User, prompt, false);
        let assistant_id = self.store.add(Role::Assistant, "", true);

        match host.start_turn(turn_messages, mode) {
            Ok(turn_id) => {
                self.phase = TurnPhase::AwaitingFirstFrame { turn_id };
                self.active = Some(ActiveTurn {
                    turn_id,
                    assistant_id,
                    mode,
                });
                Ok(turn_id)
            }
            Err(error) => {
                self.store.remove(&assistant_id);
                self.store.remove(&user_id);
                Err(SubmitError::Host(error))
            }
        }
    }

    /// User-initiated abort. Annotates the open message immediately so no
    /// later frame can mutate content, then signals the host.
    pub fn on_cancel(&mut self, host: &mut dyn HostOps) -> bool {
        if self.cancelling.is_some() {
            return false;
        }

        let Some(active) = self.active.take() else {
            return false;
        };

        self.store
            .close_annotated(&active.assistant_id, CANCELLED_ANNOTATION);
        self.cancelling = Some(active.turn_id);
        self.phase = TurnPhase::Idle;
        host.cancel_turn(active.turn_id);
        true
    }

    /// Clears the conversation. Rejected while a turn is open so an in-flight
    /// stream can never mutate a recycled message list.
    pub fn clear(&mut self) -> bool {
        if self.is_loading() {
            return false;
        }
        self.store.clear();
        self.decode_notices.clear();
        true
    }

    pub fn on_turn_started(&mut self, turn_id: TurnId) {
        if self.is_active_turn(turn_id) {
            log::debug!("turn {turn_id} started");
        }
    }

    /// Reconciles one content frame into the open assistant message.
    /// Frames arriving after a cancel, or for a stale turn, are dropped.
    pub fn on_turn_frame(&mut self, turn_id: TurnId, text: &str) {
        if self.cancelling == Some(turn_id) {
            return;
        }

        let Some(active) = self.active.as_ref().filter(|active| active.turn_id == turn_id) else {
            return;
        };

        let mode = active.mode;
        let assistant_id = active.assistant_id.clone();
        self.store
            .update_open(&assistant_id, |content| reconcile(mode, content, text));

        if matches!(self.phase, TurnPhase::AwaitingFirstFrame { turn_id: id } if id == turn_id) {
            self.phase = TurnPhase::Streaming { turn_id };
        }
    }

    /// Records a skipped-line notification. Non-fatal; the turn stays open.
    pub fn on_decode_skipped(&mut self, turn_id: TurnId, reason: &str) {
        if !self.is_active_turn(turn_id) && self.cancelling != Some(turn_id) {
            return;
        }

        log::warn!("turn {turn_id}: skipped malformed stream frame: {reason}");
        if self.decode_notices.len() == MAX_DECODE_NOTICES {
            self.decode_notices.remove(0);
        }
        self.decode_notices.push(reason.to_owned());
    }

    pub fn on_turn_finished(&mut self, turn_id: TurnId) {
        if self.settle_cancel(turn_id) {
            return;
        }

        let Some(active) = self.take_active(turn_id) else {
            return;
        };

        self.store.finalize(&active.assistant_id);
        self.phase = TurnPhase::Idle;
    }

    pub fn on_turn_failed(&mut self, turn_id: TurnId, error: &str) {
        if self.settle_cancel(turn_id) {
            return;
        }

        let Some(active) = self.take_active(turn_id) else {
            return;
        };

        self.store
            .fail(&active.assistant_id, format!("**Error:** {error}"));
        self.phase = TurnPhase::Idle;
    }

    pub fn on_turn_cancelled(&mut self, turn_id: TurnId) {
        if self.settle_cancel(turn_id) {
            return;
        }

        // Provider-side cancellation without a user request; close the
        // placeholder the same way.
        if let Some(active) = self.take_active(turn_id) {
            self.store
                .close_annotated(&active.assistant_id, CANCELLED_ANNOTATION);
            self.phase = TurnPhase::Idle;
        }
    }

    fn history_with_prompt(&self, prompt: &str) -> Vec<TurnMessage> {
        let mut messages: Vec<TurnMessage> = self
            .store
            .messages()
            .iter()
            .filter(|message| !message.content.trim().is_empty())
            .map(|message| match message.role {
                Role::User => TurnMessage::UserText {
                    text: message.content.clone(),
                },
                Role::Assistant => TurnMessage::AssistantText {
                    text: message.content.clone(),
                },
            })
            .collect();

        messages.push(TurnMessage::UserText {
            text: prompt.to_owned(),
        });
        messages
    }

    fn is_active_turn(&self, turn_id: TurnId) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.turn_id == turn_id)
    }

    fn take_active(&mut self, turn_id: TurnId) -> Option<ActiveTurn> {
        if self.is_active_turn(turn_id) {
            self.active.take()
        } else {
            None
        }
    }

    /// Absorbs the terminal event of a cancelled turn. The annotation was
    /// already applied at cancel time; this only releases the loading gate.
    fn settle_cancel(&mut self, turn_id: TurnId) -> bool {
        if self.cancelling == Some(turn_id) {
            self.cancelling = None;
            true
        } else {
            false
        }
    }
}
