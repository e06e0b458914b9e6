use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

#[derive(Debug)]
pub enum InceptionApiError {
    MissingApiKey,
    InvalidBaseUrl(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    StreamFailed { message: String },
    Serde(JsonError),
    Cancelled,
    Unknown(String),
}

impl InceptionApiError {
    /// Returns true when the failure is the distinct cancelled outcome
    /// rather than an error.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: Option<ErrorBodyValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ErrorBodyValue {
    Text(String),
    Fields { message: Option<String> },
}

impl ErrorBodyValue {
    fn message(&self) -> Option<&str> {
        match self {
            Self::Text(text) => non_empty_str(text),
            Self::Fields { message } => message.as_deref().and_then(non_empty_str),
        }
    }
}

impl fmt::Display for InceptionApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "API key is required"),
            Self::InvalidBaseUrl(value) => write!(f, "invalid base URL: {value}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::StreamFailed { message } => write!(f, "stream failed: {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::Cancelled => write!(f, "request was cancelled"),
            Self::Unknown(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for InceptionApiError {}

impl From<reqwest::Error> for InceptionApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for InceptionApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// Extract a readable message from an error response body, falling back to
/// the body text or the status reason phrase.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.error.as_ref().and_then(ErrorBodyValue::message) {
            return message.to_owned();
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

/// Human-readable annotation for an HTTP failure, classified by status class
/// only: 401 auth, 429 rate limit, 5xx server; anything else keeps the
/// parsed message.
pub fn status_annotation(status: StatusCode, message: &str) -> String {
    if status == StatusCode::UNAUTHORIZED {
        return "Invalid API key. Please check your credentials.".to_owned();
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return "Rate limit exceeded. Please try again later.".to_owned();
    }
    if status.is_server_error() {
        return "Server error occurred. Please try again.".to_owned();
    }

    if message.trim().is_empty() {
        "An error occurred while processing your request.".to_owned()
    } else {
        message.to_owned()
    }
}

fn non_empty_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
