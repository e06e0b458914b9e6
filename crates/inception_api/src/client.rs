use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::config::InceptionApiConfig;
use crate::error::{parse_error_message, InceptionApiError};
use crate::events::ChatStreamEvent;
use crate::headers::build_headers;
use crate::payload::{CompletionsRequest, WireMessage};
use crate::sse::SseStreamParser;
use crate::url::normalize_completions_url;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Outcome of the setup-time credential probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KeyValidation {
    #[must_use]
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    #[must_use]
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug)]
pub struct InceptionApiClient {
    http: Client,
    config: InceptionApiConfig,
}

impl InceptionApiClient {
    pub fn new(config: InceptionApiConfig) -> Result<Self, InceptionApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(InceptionApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &InceptionApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_completions_url(&self.config.base_url)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, InceptionApiError> {
        let headers = build_headers(&self.config)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    InceptionApiError::InvalidBaseUrl(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(&value).map_err(|_| {
                    InceptionApiError::InvalidBaseUrl(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &CompletionsRequest,
    ) -> Result<reqwest::RequestBuilder, InceptionApiError> {
        let headers = self.build_headers()?;
        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(headers)
            .json(request))
    }

    /// Issue one completion request and return the raw streaming response.
    ///
    /// Exactly one request per call; a non-2xx status becomes
    /// [`InceptionApiError::Status`] carrying the parsed message.
    pub async fn send(
        &self,
        request: &CompletionsRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, InceptionApiError> {
        if is_cancelled(cancellation) {
            return Err(InceptionApiError::Cancelled);
        }

        let response = self.build_request(request)?.send();
        let response = await_or_cancel(response, cancellation)
            .await?
            .map_err(InceptionApiError::from)?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .unwrap_or_default();
        Err(InceptionApiError::Status(
            status,
            parse_error_message(status, &body),
        ))
    }

    /// Stream one turn, handing each decoded event to `on_event` in arrival
    /// order.
    ///
    /// A payload-level error frame stops consumption and surfaces as
    /// [`InceptionApiError::StreamFailed`]. Malformed lines are handed to
    /// `on_event` as [`ChatStreamEvent::Invalid`] and never abort the stream.
    pub async fn stream_with_handler<F>(
        &self,
        request: &CompletionsRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<(), InceptionApiError>
    where
        F: FnMut(ChatStreamEvent),
    {
        let response = self.send(request, cancellation).await?;
        let mut bytes = response.bytes_stream();
        let mut parser = SseStreamParser::default();

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            if is_cancelled(cancellation) {
                return Err(InceptionApiError::Cancelled);
            }
            let chunk = chunk.map_err(InceptionApiError::from)?;
            for event in parser.feed(&chunk) {
                process_stream_event(event, &mut on_event)?;
            }
        }

        for event in parser.finish() {
            process_stream_event(event, &mut on_event)?;
        }

        if is_cancelled(cancellation) {
            return Err(InceptionApiError::Cancelled);
        }

        Ok(())
    }

    pub async fn stream(
        &self,
        request: &CompletionsRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Vec<ChatStreamEvent>, InceptionApiError> {
        let mut events = Vec::new();
        self.stream_with_handler(request, cancellation, |event| {
            events.push(event);
        })
        .await?;

        Ok(events)
    }

    /// Setup-time credential probe: a minimal one-token completion.
    ///
    /// Never returns an error; failures are folded into the validation
    /// outcome the way the original validation endpoint reports them.
    pub async fn validate_key(&self) -> KeyValidation {
        let mut probe =
            CompletionsRequest::new(self.config.model.clone(), vec![WireMessage::user("Hi")]);
        probe.max_tokens = 1;
        probe.stream = false;

        match self.send(&probe, None).await {
            Ok(_) => KeyValidation::valid(),
            Err(InceptionApiError::Status(_, message)) => KeyValidation::invalid(message),
            Err(InceptionApiError::Request(error)) => {
                KeyValidation::invalid(format!("Network error: {error}"))
            }
            Err(error) => KeyValidation::invalid(error.to_string()),
        }
    }
}

fn process_stream_event<F>(
    event: ChatStreamEvent,
    on_event: &mut F,
) -> Result<(), InceptionApiError>
where
    F: FnMut(ChatStreamEvent),
{
    if let ChatStreamEvent::Error { message } = &event {
        return Err(InceptionApiError::StreamFailed {
            message: message.clone(),
        });
    }

    if let ChatStreamEvent::Invalid { reason } = &event {
        log::warn!("skipping malformed stream line: {reason}");
    }

    on_event(event);
    Ok(())
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, InceptionApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(InceptionApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(InceptionApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
