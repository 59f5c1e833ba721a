/// Canonical form of a free-text wine attribute for equality comparison.
///
/// Lowercases, trims, then drops every character that is neither an ASCII word
/// character (`[A-Za-z0-9_]`) nor whitespace. Accented letters are dropped,
/// not folded, so `Château` and `Chateau` stay distinct.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect()
}
