use chat_provider::ChatMode;
use prefs_store::{ApiKeys, PrefsStore, PrefsStoreError};
use serde_json::{json, Value};

/// Default token budget for one turn.
pub const DEFAULT_MAX_TOKENS: u32 = 800;

/// Persisted chat configuration: the render mode, the credential string,
/// and the per-turn request knobs.
///
/// The preference store is only ever a read/write source for the mode and
/// key; everything else is in-process state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub mode: ChatMode,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub tools_enabled: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            mode: ChatMode::default(),
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            tools_enabled: false,
        }
    }
}

impl ChatConfig {
    /// Reads the persisted mode and key; unknown mode names fall back to
    /// the default rather than failing startup.
    pub fn load(store: &PrefsStore) -> Result<Self, PrefsStoreError> {
        let keys = store.api_keys()?;
        let mode = store
            .chat_mode()?
            .as_deref()
            .and_then(ChatMode::parse)
            .unwrap_or_default();

        Ok(Self {
            mode,
            api_key: keys.inception,
            ..Self::default()
        })
    }

    /// Writes the mode and key back to their namespaces and persists.
    pub fn save(&self, store: &mut PrefsStore) -> Result<(), PrefsStoreError> {
        store.set_chat_mode(self.mode.as_str())?;
        store.set_api_keys(&ApiKeys {
            inception: self.api_key.clone(),
        })?;
        store.save()
    }

    /// Tool definitions to forward with each turn, per the tools toggle.
    #[must_use]
    pub fn tool_definitions(&self) -> Vec<Value> {
        if self.tools_enabled {
            vec![web_search_tool_definition()]
        } else {
            Vec::new()
        }
    }
}

/// The one tool the hosted endpoint understands; executed server-side, the
/// client only forwards the definition.
#[must_use]
pub fn web_search_tool_definition() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": "web_search",
            "description": "Search the web for current information on any topic",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The search query"},
                    "max_results": {
                        "type": "integer",
                        "description": "Max results (default: 3)",
                        "default": 3
                    }
                },
                "required": ["query"]
            }
        }
    })
}
