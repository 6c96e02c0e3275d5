//! Shared utility functions used across the codebase.

/// Recognises `1`, `true`, `yes`, `y`, `on` (case-insensitive) as `true`;
/// any other value maps to `false` and a missing value maps to `default`.
pub fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value {
        Some(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        None => default,
    }
}

/// First `max_chars` characters of `text`, with `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
