//! Input sanitisation helpers for downstream handlers.

use std::sync::LazyLock;

use regex::Regex;

const DANGEROUS_TOKENS: [&str; 7] = ["<", ">", "\"", "'", "&", "script", "javascript"];

const PLACEHOLDER_KEY_MARKERS: [&str; 4] = ["test", "demo", "example", "placeholder"];

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern is a valid regex"));

/// Truncate to `max_length` characters, strip markup-significant tokens and trim.
pub fn sanitize_string(input: &str, max_length: usize) -> String {
    let mut out: String = input.chars().take(max_length).collect();
    for token in DANGEROUS_TOKENS {
        out = out.replace(token, "");
    }
    out.trim().to_string()
}

pub fn is_valid_email(candidate: &str) -> bool {
    EMAIL.is_match(candidate)
}

/// Rejects short keys and obvious placeholders such as `demo-key-123`.
pub fn is_plausible_api_key(key: &str) -> bool {
    if key.chars().count() < 10 {
        return false;
    }
    let lower = key.to_lowercase();
    !PLACEHOLDER_KEY_MARKERS.iter().any(|m| lower.contains(m))
}
