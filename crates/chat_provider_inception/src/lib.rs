//! dLLM API-backed implementation of the shared `chat_provider` contract.
//!
//! This adapter translates `inception_api` stream semantics into
//! deterministic `TurnEvent` lifecycle events expected by the chat core:
//! content frames pass through in arrival order, malformed lines become
//! non-fatal decode-skip signals, and every transport outcome maps to
//! exactly one terminal event.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chat_provider::{
    CancelSignal, ChatMode, ProviderInitError, ProviderProfile, TurnEvent, TurnMessage,
    TurnProvider, TurnRequest,
};
use inception_api::{
    status_annotation, ChatStreamEvent, CompletionsRequest, InceptionApiClient,
    InceptionApiConfig, InceptionApiError, WireMessage,
};

/// Stable provider identifier used by embedder startup selection.
pub const INCEPTION_PROVIDER_ID: &str = "inception-api";

/// Default sampling temperature sent with every turn.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Runtime configuration for the dLLM API provider.
#[derive(Debug, Clone, PartialEq)]
pub struct InceptionProviderConfig {
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f64>,
    pub timeout: Option<Duration>,
}

impl InceptionProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
            temperature: Some(DEFAULT_TEMPERATURE),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn into_api_config(self) -> InceptionApiConfig {
        let mut config = InceptionApiConfig::new(self.api_key);

        if let Some(model) = self.model {
            config = config.with_model(model);
        }

        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        config
    }
}

trait StreamClient: Send + Sync {
    fn model(&self) -> String;

    fn stream(
        &self,
        request: &CompletionsRequest,
        cancel: &CancelSignal,
        on_event: &mut dyn FnMut(ChatStreamEvent),
    ) -> Result<(), InceptionApiError>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: InceptionApiClient,
}

impl StreamClient for DefaultStreamClient {
    fn model(&self) -> String {
        self.client.config().model.clone()
    }

    fn stream(
        &self,
        request: &CompletionsRequest,
        cancel: &CancelSignal,
        on_event: &mut dyn FnMut(ChatStreamEvent),
    ) -> Result<(), InceptionApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                InceptionApiError::Unknown(format!("failed to initialize tokio runtime: {error}"))
            })?;

        runtime.block_on(
            self.client
                .stream_with_handler(request, Some(cancel), on_event),
        )
    }
}

/// `TurnProvider` adapter backed by `inception_api` transport primitives.
pub struct InceptionProvider {
    temperature: Option<f64>,
    stream_client: Arc<dyn StreamClient>,
}

impl InceptionProvider {
    /// Creates a provider using real dLLM API transport.
    pub fn new(config: InceptionProviderConfig) -> Result<Self, ProviderInitError> {
        let temperature = config.temperature;
        let stream_client = Arc::new(DefaultStreamClient {
            client: InceptionApiClient::new(config.into_api_config()).map_err(map_init_error)?,
        });

        Ok(Self {
            temperature,
            stream_client,
        })
    }

    fn build_payload(&self, req: &TurnRequest) -> CompletionsRequest {
        let messages = req
            .messages
            .iter()
            .map(|message| match message {
                TurnMessage::UserText { text } => WireMessage::user(text.clone()),
                TurnMessage::AssistantText { text } => WireMessage::assistant(text.clone()),
            })
            .collect();

        let mut payload = CompletionsRequest::new(self.stream_client.model(), messages)
            .retain_non_empty_messages();
        payload.max_tokens = req.max_tokens;
        payload.temperature = self.temperature;
        payload.diffusing = req.mode == ChatMode::Diffusing;
        payload.tools = req.tools.clone();
        payload
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(stream_client: Arc<dyn StreamClient>) -> Self {
        Self {
            temperature: Some(DEFAULT_TEMPERATURE),
            stream_client,
        }
    }
}

impl TurnProvider for InceptionProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: INCEPTION_PROVIDER_ID.to_string(),
            model_id: self.stream_client.model(),
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

        if cancel.load(Ordering::Acquire) {
            emit(TurnEvent::Cancelled { turn_id });
            return Ok(());
        }

        let payload = self.build_payload(&req);
        let mut forward = |event: ChatStreamEvent| match event {
            ChatStreamEvent::Content { text } => emit(TurnEvent::Frame { turn_id, text }),
            ChatStreamEvent::Invalid { reason } => {
                log::warn!("turn {turn_id}: skipped malformed stream line: {reason}");
                emit(TurnEvent::DecodeSkipped { turn_id, reason });
            }
            // Error frames abort the stream inside the transport and arrive
            // here as `StreamFailed`.
            ChatStreamEvent::Error { .. } => {}
        };

        match self.stream_client.stream(&payload, &cancel, &mut forward) {
            Ok(()) => emit(TurnEvent::Finished { turn_id }),
            Err(InceptionApiError::Cancelled) => emit(TurnEvent::Cancelled { turn_id }),
            Err(error) => emit(TurnEvent::Failed {
                turn_id,
                error: user_facing_error(&error),
            }),
        }

        Ok(())
    }
}

/// Collapse a transport failure into the annotation text shown in the
/// assistant message, classifying HTTP failures by status class.
fn user_facing_error(error: &InceptionApiError) -> String {
    match error {
        InceptionApiError::Status(status, message) => status_annotation(*status, message),
        InceptionApiError::StreamFailed { message } => message.clone(),
        other => other.to_string(),
    }
}

fn map_init_error(error: InceptionApiError) -> ProviderInitError {
    ProviderInitError::new(format!(
        "Failed to initialize inception-api provider: {error}"
    ))
}
