use chat_provider::ChatMode;

/// Applies one content frame to the open assistant buffer.
///
/// Streaming mode appends (monotonic; content never shrinks). Diffusing mode
/// replaces wholesale: each frame is a complete re-rendering of the answer so
/// far, not a delta, so callers must not assume monotonic growth. The two
/// policies never mix within one turn; the mode is captured at submit time.
pub fn reconcile(mode: ChatMode, current: &mut String, frame_text: &str) {
    match mode {
        ChatMode::Streaming => current.push_str(frame_text),
        ChatMode::Diffusing => {
            current.clear();
            current.push_str(frame_text);
        }
    }
}
