use std::collections::BTreeMap;

use crate::config::InceptionApiConfig;
use crate::error::InceptionApiError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_USER_AGENT: &str = "User-Agent";

/// Build a deterministic header map for dLLM transport requests.
pub fn build_headers(
    config: &InceptionApiConfig,
) -> Result<BTreeMap<String, String>, InceptionApiError> {
    let mut headers = BTreeMap::new();

    if config.api_key.trim().is_empty() {
        return Err(InceptionApiError::MissingApiKey);
    }

    headers.insert(
        HEADER_AUTHORIZATION.to_owned(),
        format!("Bearer {}", config.api_key.trim()),
    );
    headers.insert(HEADER_ACCEPT.to_owned(), "text/event-stream".to_owned());
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );

    if let Some(user_agent) = config.user_agent.as_deref() {
        if !user_agent.trim().is_empty() {
            headers.insert(HEADER_USER_AGENT.to_owned(), user_agent.trim().to_owned());
        }
    }

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    Ok(headers)
}
