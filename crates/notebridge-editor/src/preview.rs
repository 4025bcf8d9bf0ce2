//! Plain-text previews

/// First `length` characters of `text`, with every whitespace run
/// collapsed to one space and the ends trimmed.
pub fn plain_preview(text: &str, length: usize) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(length)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(plain_preview("  one\n\n two\tthree  ", 90), "one two three");
    }

    #[test]
    fn test_truncates_on_char_boundaries() {
        assert_eq!(plain_preview("héllo wörld", 7), "héllo w");
        assert_eq!(plain_preview("", 90), "");
    }
}
