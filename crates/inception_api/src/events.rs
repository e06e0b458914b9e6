use serde_json::Value;

/// Stream event emitted by the parser after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStreamEvent {
    /// One decoded content frame. Append-delta in streaming mode, full
    /// redraw in diffusing mode; the transport does not distinguish.
    Content { text: String },
    /// Payload-level failure; terminal for the turn it belongs to.
    Error { message: String },
    /// A `data:`-prefixed line that could not be decoded. Skipped, never
    /// fatal; surfaced so callers can notify out of band.
    Invalid { reason: String },
}

impl ChatStreamEvent {
    /// Returns true when this event ends the turn it belongs to.
    #[must_use]
    pub fn is_terminal_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Map a parsed payload object's recognized fields into a stream event.
///
/// Recognized shapes, in priority order:
/// - `{"error": "..."}"` or `{"error": {"message": "..."}}`
/// - `{"content": "..."}` (the re-wrapped event shape)
/// - `{"choices": [{"delta": {"content": "..."}}]}` (raw upstream chunks)
///
/// Objects with none of these fields are ignored.
pub fn map_payload(value: &Value) -> Option<ChatStreamEvent> {
    if let Some(error) = value.get("error") {
        return Some(ChatStreamEvent::Error {
            message: error_message(error),
        });
    }

    if let Some(text) = value.get("content").and_then(Value::as_str) {
        return Some(ChatStreamEvent::Content {
            text: text.to_owned(),
        });
    }

    let delta_content = value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)?;

    Some(ChatStreamEvent::Content {
        text: delta_content.to_owned(),
    })
}

fn error_message(error: &Value) -> String {
    if let Some(message) = error.as_str() {
        return message.to_owned();
    }

    error
        .get("message")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .unwrap_or_else(|| "Stream error occurred".to_owned())
}
