use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Namespace holding saved provider credentials.
pub const API_KEYS_NAMESPACE: &str = "api-keys-store";
/// Namespace holding the persisted render-mode preference.
pub const CHAT_MODE_NAMESPACE: &str = "chat-mode-storage";

/// On-disk document: one version-stamped object of namespaced values.
///
/// Namespaces this crate does not know about are preserved verbatim so an
/// older build never drops a newer build's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefsDocument {
    pub version: u32,
    pub updated_at: String,
    #[serde(default)]
    pub namespaces: BTreeMap<String, Value>,
}

impl PrefsDocument {
    #[must_use]
    pub fn v1(updated_at: impl Into<String>) -> Self {
        Self {
            version: 1,
            updated_at: updated_at.into(),
            namespaces: BTreeMap::new(),
        }
    }
}

/// Typed view of the credentials namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inception: Option<String>,
}

impl ApiKeys {
    /// Returns true when every credential required for chatting is present.
    #[must_use]
    pub fn has_required_keys(&self) -> bool {
        self.inception
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// Typed view of the render-mode namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModePreference {
    #[serde(default)]
    pub mode: String,
}
