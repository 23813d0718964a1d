//! Shared utility functions

/// Truncate a string to at most `max_bytes` on a UTF-8 character boundary.
pub fn truncate_utf8_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Single-line preview of message text for log lines
///
/// Newlines become spaces and anything past `max_bytes` is cut with an ellipsis,
/// so audit diagnostics never dump whole messages.
pub fn text_preview(s: &str, max_bytes: usize) -> String {
    let flat: String = s
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let cut = truncate_utf8_safe(&flat, max_bytes);
    if cut.len() < flat.len() {
        format!("{}…", cut)
    } else {
        flat
    }
}
