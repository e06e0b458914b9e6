use std::sync::Arc;

use chat_provider::TurnProvider;
use chat_provider_inception::{InceptionProvider, InceptionProviderConfig, INCEPTION_PROVIDER_ID};
use chat_provider_mock::{MockProvider, MOCK_PROVIDER_ID};

use crate::config::ChatConfig;

pub const DEFAULT_PROVIDER_ID: &str = INCEPTION_PROVIDER_ID;
pub const PROVIDER_ENV_VAR: &str = "DLLM_CHAT_PROVIDER";

/// Resolves the turn provider from the environment, defaulting to the real
/// endpoint-backed provider.
pub fn provider_from_env(config: &ChatConfig) -> Result<Arc<dyn TurnProvider>, String> {
    let provider_id = std::env::var(PROVIDER_ENV_VAR)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    provider_for_id(provider_id.as_deref().unwrap_or(DEFAULT_PROVIDER_ID), config)
}

pub fn provider_for_id(
    provider_id: &str,
    config: &ChatConfig,
) -> Result<Arc<dyn TurnProvider>, String> {
    match provider_id {
        INCEPTION_PROVIDER_ID => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| "An API key is required for the inception-api provider".to_string())?;
            let provider = InceptionProvider::new(InceptionProviderConfig::new(api_key))
                .map_err(|error| error.to_string())?;
            Ok(Arc::new(provider))
        }
        MOCK_PROVIDER_ID => Ok(Arc::new(MockProvider::default())),
        unknown => Err(format!(
            "Unsupported provider '{unknown}'. Available providers: {INCEPTION_PROVIDER_ID}, {MOCK_PROVIDER_ID}"
        )),
    }
}
