//! Canonical form for answer comparison

/// Map raw answer or guess text to the form used for comparison:
/// surrounding whitespace trimmed, then lower-cased. Inner whitespace is
/// kept as typed.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
