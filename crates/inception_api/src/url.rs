/// Default base URL for dLLM transport requests.
pub const DEFAULT_INCEPTION_BASE_URL: &str = "https://api.inceptionlabs.ai/v1";

/// Normalize a base URL to a chat-completions endpoint.
///
/// Normalization rules:
/// 1) keep `/chat/completions` unchanged
/// 2) append `/chat/completions` when path ends in `/v1`
/// 3) append `/v1/chat/completions` otherwise
pub fn normalize_completions_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_INCEPTION_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        return trimmed.to_string();
    }
    if trimmed.ends_with("/v1") {
        return format!("{trimmed}/chat/completions");
    }
    format!("{trimmed}/v1/chat/completions")
}
