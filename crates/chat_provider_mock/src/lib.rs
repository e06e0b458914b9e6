//! Deterministic mock implementation of the shared `chat_provider` contract.
//!
//! This crate contains no transport/protocol logic and is intended for local
//! development and contract-level integration testing.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use chat_provider::{
    CancelSignal, ProviderProfile, TurnEvent, TurnProvider, TurnRequest,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// One scripted stream element replayed by [`MockProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedFrame {
    /// A content frame, delivered as [`TurnEvent::Frame`].
    Content(String),
    /// A malformed-line skip, delivered as [`TurnEvent::DecodeSkipped`].
    DecodeSkip(String),
    /// A payload-level failure; ends the turn with [`TurnEvent::Failed`].
    Fail(String),
}

/// Deterministic mock provider used by chat-core tests and local runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockProvider {
    script: Vec<ScriptedFrame>,
    frame_delay: Duration,
}

impl MockProvider {
    /// Creates a mock provider replaying content frames only.
    #[must_use]
    pub fn new(frames: Vec<String>) -> Self {
        Self::with_script(frames.into_iter().map(ScriptedFrame::Content).collect())
    }

    /// Creates a mock provider replaying an explicit script.
    #[must_use]
    pub fn with_script(script: Vec<ScriptedFrame>) -> Self {
        Self {
            script,
            frame_delay: Duration::ZERO,
        }
    }

    /// Sleeps between frames; used by cancellation tests that need a window
    /// to flip the cancel signal mid-stream.
    #[must_use]
    pub fn with_frame_delay(mut self, frame_delay: Duration) -> Self {
        self.frame_delay = frame_delay;
        self
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(vec![
            "## Mocked dLLM reply\n".to_string(),
            "- Streaming mode appends each frame.\n".to_string(),
            "- Diffusing mode redraws the whole answer per frame.\n".to_string(),
            "Completed.\n".to_string(),
        ])
    }
}

impl TurnProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: "mock-model".to_string(),
        }
    }

    fn run(
        &self,
        req: TurnRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(TurnEvent),
    ) -> Result<(), String> {
        let turn_id = req.turn_id;

        emit(TurnEvent::Started { turn_id });

        for frame in &self.script {
            if cancel.load(Ordering::Acquire) {
                emit(TurnEvent::Cancelled { turn_id });
                return Ok(());
            }

            if !self.frame_delay.is_zero() {
                thread::sleep(self.frame_delay);
                if cancel.load(Ordering::Acquire) {
                    emit(TurnEvent::Cancelled { turn_id });
                    return Ok(());
                }
            }

            match frame {
                ScriptedFrame::Content(text) => emit(TurnEvent::Frame {
                    turn_id,
                    text: text.clone(),
                }),
                ScriptedFrame::DecodeSkip(reason) => emit(TurnEvent::DecodeSkipped {
                    turn_id,
                    reason: reason.clone(),
                }),
                ScriptedFrame::Fail(error) => {
                    emit(TurnEvent::Failed {
                        turn_id,
                        error: error.clone(),
                    });
                    return Ok(());
                }
            }
        }

        if cancel.load(Ordering::Acquire) {
            emit(TurnEvent::Cancelled { turn_id });
        } else {
            emit(TurnEvent::Finished { turn_id });
        }

        Ok(())
    }
}
