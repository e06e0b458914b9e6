use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use chat_provider::{TurnId, TurnProvider};
use dllm_chat::{ChatApp, TurnRuntime, TurnRuntimeConfig};

const DRAIN_DEADLINE: Duration = Duration::from_secs(5);
const DRAIN_POLL: Duration = Duration::from_millis(5);

/// App + runtime pair wired against a caller-provided provider, with a
/// ready (validated) credential so submits go straight through.
pub struct Harness {
    pub app: Arc<Mutex<ChatApp>>,
    pub runtime: Arc<TurnRuntime>,
}

pub fn harness(provider: Arc<dyn TurnProvider>) -> Harness {
    harness_with_config(provider, TurnRuntimeConfig::default())
}

pub fn harness_with_config(provider: Arc<dyn TurnProvider>, config: TurnRuntimeConfig) -> Harness {
    let mut app = ChatApp::new();
    app.set_api_key("sk-test-key-123");
    app.set_key_validated(true);

    let app = Arc::new(Mutex::new(app));
    let runtime = TurnRuntime::new(Arc::clone(&app), provider, config);

    Harness { app, runtime }
}

impl Harness {
    pub fn submit(&self, text: &str) -> TurnId {
        let mut host = Arc::clone(&self.runtime);
        lock_unpoisoned(&self.app)
            .on_submit(text, &mut host)
            .expect("submit should start a turn")
    }

    pub fn cancel(&self) -> bool {
        let mut host = Arc::clone(&self.runtime);
        lock_unpoisoned(&self.app).on_cancel(&mut host)
    }

    pub fn with_app<R>(&self, read: impl FnOnce(&ChatApp) -> R) -> R {
        read(&lock_unpoisoned(&self.app))
    }

    /// Flushes queued events until the app settles back to idle.
    pub fn drain_until_idle(&self) {
        let deadline = Instant::now() + DRAIN_DEADLINE;

        loop {
            self.runtime.flush_pending_turn_events();
            if !self.with_app(ChatApp::is_loading) {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "turn did not settle before the drain deadline"
            );
            thread::sleep(DRAIN_POLL);
        }
    }

    /// Flushes queued events until `condition` holds on the app.
    pub fn drain_until(&self, condition: impl Fn(&ChatApp) -> bool) {
        let deadline = Instant::now() + DRAIN_DEADLINE;

        loop {
            self.runtime.flush_pending_turn_events();
            if self.with_app(&condition) {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "condition did not hold before the drain deadline"
            );
            thread::sleep(DRAIN_POLL);
        }
    }
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
