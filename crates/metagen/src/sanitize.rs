//! Helpers for sanitizing data before it enters logs, spans, or
//! user-visible messages.

use std::path::Path;

/// Longest service detail message surfaced to the user.
const MAX_DETAIL_LENGTH: usize = 300;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Replaces every occurrence of `secret` in `text` with `****`.
/// Services sometimes echo the request URL (and its key) in error bodies.
pub fn redact_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, "****")
}

/// Truncates a detail message on a character boundary.
pub fn truncate_detail(detail: &str) -> String {
    if detail.chars().count() <= MAX_DETAIL_LENGTH {
        return detail.to_string();
    }
    let truncated: String = detail.chars().take(MAX_DETAIL_LENGTH).collect();
    format!("{}... (truncated)", truncated)
}
