use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use chat_provider::{
    CancelSignal, ChatMode, TurnEvent, TurnId, TurnMessage, TurnProvider, TurnRequest,
};
use serde_json::Value;

use crate::app::{ChatApp, HostOps};
use crate::config::DEFAULT_MAX_TOKENS;

pub const ERROR_TURN_ALREADY_ACTIVE: &str = "Turn already active";

/// Hook invoked when new turn events are queued; embedding shells use it to
/// schedule a drain on their own loop.
pub trait EventNotifier: Send + Sync + 'static {
    fn events_ready(&self) {}
}

#[derive(Debug, Default)]
struct NullNotifier;

impl EventNotifier for NullNotifier {}

/// Per-turn request knobs shared by every turn this runtime starts.
#[derive(Debug, Clone)]
pub struct TurnRuntimeConfig {
    pub max_tokens: u32,
    /// Tool definitions forwarded with every turn; empty disables tools.
    pub tools: Vec<Value>,
}

impl Default for TurnRuntimeConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            tools: Vec::new(),
        }
    }
}

struct ActiveWorker {
    turn_id: TurnId,
    cancel: CancelSignal,
    join_handle: Option<JoinHandle<()>>,
}

/// Drives one provider turn at a time on a worker thread and applies its
/// events to the app strictly in arrival order.
pub struct TurnRuntime {
    app: Arc<Mutex<ChatApp>>,
    provider: Arc<dyn TurnProvider>,
    config: TurnRuntimeConfig,
    pending_events: Arc<Mutex<VecDeque<TurnEvent>>>,
    next_turn_id: AtomicU64,
    active_worker: Mutex<Option<ActiveWorker>>,
    notifier: Arc<dyn EventNotifier>,
}

impl TurnRuntime {
    /// Creates a runtime that buffers turn events before applying them to
    /// the app.
    ///
    /// In shell environments, events are drained when the notifier fires. In
    /// headless or non-polling environments, call
    /// [`TurnRuntime::flush_pending_turn_events`] after enqueuing work to
    /// ensure queued turn state is applied.
    pub fn new(
        app: Arc<Mutex<ChatApp>>,
        provider: Arc<dyn TurnProvider>,
        config: TurnRuntimeConfig,
    ) -> Arc<Self> {
        Self::with_notifier(app, provider, config, Arc::new(NullNotifier))
    }

    pub fn with_notifier(
        app: Arc<Mutex<ChatApp>>,
        provider: Arc<dyn TurnProvider>,
        config: TurnRuntimeConfig,
        notifier: Arc<dyn EventNotifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            app,
            provider,
            config,
            pending_events: Arc::new(Mutex::new(VecDeque::new())),
            next_turn_id: AtomicU64::new(1),
            active_worker: Mutex::new(None),
            notifier,
        })
    }

    #[must_use]
    pub fn app(&self) -> Arc<Mutex<ChatApp>> {
        Arc::clone(&self.app)
    }

    #[must_use]
    pub fn has_active_turn(&self) -> bool {
        self.lock_active_worker().is_some()
    }

    fn start_turn_internal(
        self: &Arc<Self>,
        messages: Vec<TurnMessage>,
        mode: ChatMode,
    ) -> Result<TurnId, String> {
        let mut active_worker = self.lock_active_worker();
        if active_worker.is_some() {
            return Err(ERROR_TURN_ALREADY_ACTIVE.to_string());
        }

        let turn_id = self.next_turn_id.fetch_add(1, Ordering::SeqCst);
        let cancel: CancelSignal = Arc::new(AtomicBool::new(false));
        let request = TurnRequest {
            turn_id,
            messages,
            mode,
            max_tokens: self.config.max_tokens,
            tools: self.config.tools.clone(),
        };

        let profile = self.provider.profile();
        log::debug!(
            "starting {} turn {turn_id} via {}/{}",
            mode.as_str(),
            profile.provider_id,
            profile.model_id
        );

        let join_handle = self.spawn_worker(request, Arc::clone(&cancel))?;

        *active_worker = Some(ActiveWorker {
            turn_id,
            cancel,
            join_handle: Some(join_handle),
        });

        Ok(turn_id)
    }

    fn spawn_worker(
        self: &Arc<Self>,
        request: TurnRequest,
        cancel: CancelSignal,
    ) -> Result<JoinHandle<()>, String> {
        let turn_id = request.turn_id;
        let runtime = Arc::clone(self);
        thread::Builder::new()
            .name(format!("chat-turn-{turn_id}"))
            .spawn(move || runtime.run_worker(request, cancel))
            .map_err(|error| format!("Failed to spawn turn worker: {error}"))
    }

    fn run_worker(self: Arc<Self>, request: TurnRequest, cancel: CancelSignal) {
        let turn_id = request.turn_id;

        let terminal_emitted = Arc::new(AtomicBool::new(false));
        let terminal_emitted_for_emit = Arc::clone(&terminal_emitted);
        let runtime = Arc::clone(&self);

        let mut emit = move |event: TurnEvent| {
            if event.is_terminal() {
                terminal_emitted_for_emit.store(true, Ordering::SeqCst);
            }

            runtime.enqueue_turn_event(event);
        };

        let provider = Arc::clone(&self.provider);
        let run_outcome = catch_unwind(AssertUnwindSafe(|| {
            provider.run(request, Arc::clone(&cancel), &mut emit)
        }));

        match run_outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => emit(TurnEvent::Failed { turn_id, error }),
            Err(_) => emit(TurnEvent::Failed {
                turn_id,
                error: "Turn provider panicked".to_string(),
            }),
        }

        if !terminal_emitted.load(Ordering::SeqCst) && self.is_active_turn_id(turn_id) {
            emit(TurnEvent::Failed {
                turn_id,
                error: "Turn provider exited without terminal event".to_string(),
            });
        }
    }

    fn enqueue_turn_event(self: &Arc<Self>, event: TurnEvent) {
        let should_notify = {
            let mut queue = lock_unpoisoned(&self.pending_events);
            let should_notify = queue.is_empty();
            queue.push_back(event);
            should_notify
        };

        if should_notify {
            self.notifier.events_ready();
        }
    }

    /// Drains queued turn events and applies them to the app in order.
    ///
    /// Returns the number of events applied. The reconciler is not
    /// reentrant; this is the single place provider events touch app state.
    pub fn flush_pending_turn_events(&self) -> usize {
        let mut drained = 0usize;

        loop {
            let event = {
                let mut pending_events = lock_unpoisoned(&self.pending_events);
                pending_events.pop_front()
            };

            match event {
                Some(event) => {
                    self.apply_turn_event(event);
                    drained += 1;
                }
                None => break,
            }
        }

        drained
    }

    fn apply_turn_event(&self, event: TurnEvent) {
        let turn_id = event.turn_id();
        let terminal = event.is_terminal();

        {
            let mut app = lock_unpoisoned(&self.app);
            match event {
                TurnEvent::Started { turn_id } => app.on_turn_started(turn_id),
                TurnEvent::Frame { turn_id, text } => app.on_turn_frame(turn_id, &text),
                TurnEvent::DecodeSkipped { turn_id, reason } => {
                    app.on_decode_skipped(turn_id, &reason)
                }
                TurnEvent::Finished { turn_id } => app.on_turn_finished(turn_id),
                TurnEvent::Failed { turn_id, error } => app.on_turn_failed(turn_id, &error),
                TurnEvent::Cancelled { turn_id } => app.on_turn_cancelled(turn_id),
            }
        }

        if terminal {
            self.clear_active_worker_if_matching(turn_id);
        }
    }

    fn clear_active_worker_if_matching(&self, turn_id: TurnId) {
        let mut active_worker = self.lock_active_worker();
        let matches = active_worker.as_ref().map(|active| active.turn_id) == Some(turn_id);
        if !matches {
            return;
        }

        let mut completed = match active_worker.take() {
            Some(completed) => completed,
            None => return,
        };

        if let Some(join_handle) = completed.join_handle.take() {
            let is_current_thread = join_handle.thread().id() == thread::current().id();
            if !is_current_thread && join_handle.is_finished() {
                let _ = join_handle.join();
            }
        }
    }

    fn is_active_turn_id(&self, turn_id: TurnId) -> bool {
        self.lock_active_worker()
            .as_ref()
            .map(|active| active.turn_id)
            == Some(turn_id)
    }

    fn cancel_turn_internal(&self, turn_id: TurnId) {
        let active_worker = self.lock_active_worker();
        if let Some(active_worker) = active_worker.as_ref() {
            if active_worker.turn_id == turn_id {
                active_worker.cancel.store(true, Ordering::Release);
            }
        }
    }

    fn lock_active_worker(&self) -> MutexGuard<'_, Option<ActiveWorker>> {
        lock_unpoisoned(&self.active_worker)
    }
}

impl HostOps for Arc<TurnRuntime> {
    fn start_turn(
        &mut self,
        messages: Vec<TurnMessage>,
        mode: ChatMode,
    ) -> Result<TurnId, String> {
        self.start_turn_internal(messages, mode)
    }

    fn cancel_turn(&mut self, turn_id: TurnId) {
        self.cancel_turn_internal(turn_id);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
