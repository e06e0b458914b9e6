//! Namespaced local preference persistence for the chat core.
//!
//! Stores the API key and render-mode preference as a versioned JSON
//! document of namespaced values, mirroring the namespaced key-value shape
//! the chat core expects from its storage collaborator.

mod error;
mod paths;
mod schema;
mod store;

pub use error::PrefsStoreError;
pub use paths::{default_prefs_path, PREFS_DIR, PREFS_FILE};
pub use schema::{
    ApiKeys, ModePreference, PrefsDocument, API_KEYS_NAMESPACE, CHAT_MODE_NAMESPACE,
};
pub use store::PrefsStore;
