//! Text normalisation used by matching code.

/// CJK punctuation stripped before exact comparisons
const CJK_PUNCTUATION: &[char] = &['。', '、', '…', '「', '」', '『', '』', '【', '】', '～'];

/// Fold full-width ASCII to half-width and the ideographic space to ' '.
fn fold_width(c: char) -> char {
    match c {
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        '\u{3000}' => ' ',
        _ => c,
    }
}

/// Normalise text for keyword matching: trim, fold width, lower-case ASCII.
pub fn normalize(text: &str) -> String {
    text.trim()
        .chars()
        .map(fold_width)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Normalised text with whitespace and punctuation removed.
///
/// Used for exact-mode rules so that "好！" and "謝謝~" match "好" and "謝謝".
pub fn strip_for_exact(text: &str) -> String {
    normalize(text)
        .chars()
        .filter(|c| {
            !(c.is_whitespace() || c.is_ascii_punctuation() || CJK_PUNCTUATION.contains(c))
        })
        .collect()
}

/// Keywords from `keywords` contained in `haystack`, in table order.
pub fn matched_keywords<'a>(haystack: &str, keywords: &'a [String]) -> Vec<&'a str> {
    keywords
        .iter()
        .filter(|kw| !kw.is_empty() && haystack.contains(kw.as_str()))
        .map(|kw| kw.as_str())
        .collect()
}

/// Length in characters, not bytes
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
