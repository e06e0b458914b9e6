use std::collections::BTreeMap;
use std::time::Duration;

use crate::url::DEFAULT_INCEPTION_BASE_URL;

/// Default model served by the endpoint.
pub const DEFAULT_MODEL: &str = "mercury-coder";

/// Transport configuration for dLLM API requests.
#[derive(Debug, Clone)]
pub struct InceptionApiConfig {
    /// Bearer token passed to `Authorization`.
    pub api_key: String,
    /// Base URL for completion endpoints.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional request timeout. Unset by default; the transport's own
    /// defaults apply to hung connections.
    pub timeout: Option<Duration>,
}

impl Default for InceptionApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_INCEPTION_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
        }
    }
}

impl InceptionApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}

/// Fast local preflight for key material before any remote probe.
///
/// Accepts keys at least ten characters long that either carry the `sk-`
/// prefix or an underscore-separated identifier.
#[must_use]
pub fn looks_like_api_key(key: &str) -> bool {
    let trimmed = key.trim();
    trimmed.len() >= 10 && (trimmed.starts_with("sk-") || trimmed.contains('_'))
}
