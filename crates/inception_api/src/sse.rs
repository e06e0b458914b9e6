use serde_json::Value;

use crate::events::{map_payload, ChatStreamEvent};

/// Sentinel payload marking end of stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental parser for `data: `-prefixed, newline-delimited event streams.
///
/// Bytes are buffered until a newline completes a line; a trailing partial
/// line is carried over so payloads may span chunk boundaries. The decoded
/// event sequence is therefore independent of how the stream was chunked.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: String,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ChatStreamEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut events = Vec::new();

        while let Some(split) = self.buffer.find('\n') {
            let line = self.buffer[..split].to_string();
            self.buffer.drain(0..split + 1);

            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Drain the final unterminated line at end of stream.
    pub fn finish(&mut self) -> Vec<ChatStreamEvent> {
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line).into_iter().collect()
    }

    /// Parse a complete stream body in one shot.
    pub fn parse_frames(input: &str) -> Vec<ChatStreamEvent> {
        let mut parser = Self::default();
        let mut events = parser.feed(input.as_bytes());
        events.extend(parser.finish());
        events
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}

fn decode_line(line: &str) -> Option<ChatStreamEvent> {
    let trimmed = line.trim();
    let payload = trimmed.strip_prefix("data:")?.trim();

    if payload.is_empty() || payload == DONE_SENTINEL {
        return None;
    }

    if !payload.starts_with('{') {
        return Some(ChatStreamEvent::Invalid {
            reason: "payload is not a JSON object".to_owned(),
        });
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(value) => map_payload(&value),
        Err(error) => Some(ChatStreamEvent::Invalid {
            reason: format!("JSON parse failure: {error}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{ChatStreamEvent, SseStreamParser};

    #[test]
    fn parse_frames_incrementally_across_feeds() {
        let mut parser = SseStreamParser::default();
        let mut events = Vec::new();

        events.extend(parser.feed(b"data: {\"content\":\"Hel"));
        assert!(events.is_empty());

        events.extend(parser.feed(b"lo\"}\n\ndata: {\"content\":\" world\"}\n\ndata: [DONE]\n"));
        assert_eq!(
            events,
            vec![
                ChatStreamEvent::Content {
                    text: "Hello".to_string(),
                },
                ChatStreamEvent::Content {
                    text: " world".to_string(),
                },
            ]
        );
        assert!(parser.is_empty_buffer());
    }

    #[test]
    fn finish_drains_an_unterminated_final_line() {
        let mut parser = SseStreamParser::default();
        assert!(parser.feed(b"data: {\"content\":\"tail\"}").is_empty());
        assert!(!parser.is_empty_buffer());

        let events = parser.finish();
        assert_eq!(
            events,
            vec![ChatStreamEvent::Content {
                text: "tail".to_string(),
            }]
        );
        assert!(parser.is_empty_buffer());
    }

    #[test]
    fn non_data_lines_and_done_are_silently_skipped() {
        let events = SseStreamParser::parse_frames(concat!(
            ": keepalive comment\n",
            "\n",
            "event: message\n",
            "data: [DONE]\n",
            "data: \n",
        ));
        assert!(events.is_empty());
    }

    #[test]
    fn malformed_data_payloads_surface_as_invalid_events() {
        let events = SseStreamParser::parse_frames("data: not-json\n");
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ChatStreamEvent::Invalid { reason }
            if reason.contains("not a JSON object")));

        let events = SseStreamParser::parse_frames("data: {broken-json\n");
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ChatStreamEvent::Invalid { reason }
            if reason.contains("JSON parse failure")));
    }

    #[test]
    fn malformed_lines_do_not_abort_subsequent_frames() {
        let events = SseStreamParser::parse_frames(concat!(
            "data: {broken\n",
            "data: {\"content\":\"after\"}\n",
        ));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ChatStreamEvent::Invalid { .. }));
        assert_eq!(
            events[1],
            ChatStreamEvent::Content {
                text: "after".to_string(),
            }
        );
    }
}
