/// Returns the longest prefix of `text` that holds at most `max_chars` characters.
///
/// Cuts on a char boundary, so the result is always valid UTF-8 and every
/// character offset inside it is also valid in `text`.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Substring of `text` between two character offsets, or `None` if out of range.
#[must_use]
pub fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let mut indices = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len()));
    let start_byte = indices.nth(start)?;
    let end_byte = if end == start {
        start_byte
    } else {
        indices.nth(end - start - 1)?
    };
    Some(&text[start_byte..end_byte])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(truncate_chars("Apple beats", 512), "Apple beats");
    }

    #[test]
    fn long_text_is_cut_to_char_count() {
        let text = "a".repeat(600);
        assert_eq!(truncate_chars(&text, 512).chars().count(), 512);
    }

    #[test]
    fn multibyte_text_cuts_on_char_boundary() {
        let text = "Société Générale €5bn";
        let cut = truncate_chars(text, 8);
        assert_eq!(cut, "Société ");
        assert!(text.starts_with(cut));
    }

    #[test]
    fn char_slice_uses_character_offsets() {
        let text = "Nestlé and Apple";
        assert_eq!(char_slice(text, 0, 6), Some("Nestlé"));
        assert_eq!(char_slice(text, 11, 16), Some("Apple"));
        assert_eq!(char_slice(text, 11, 17), None);
    }
}
