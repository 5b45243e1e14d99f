//! Text helpers shared by the scraper and the notifier.
//!
//! - Unicode to ASCII normalization for storage and display
//! - Character-based truncation (never splits a code point)
//! - Log-friendly previews of long strings

use unicode_normalization::UnicodeNormalization;

/// Normalize text to a best-effort ASCII approximation.
///
/// The text is decomposed with NFKD and every character outside the 7-bit
/// range is dropped, so `"Café"` becomes `"Cafe"` and emoji disappear.
/// Empty input yields an empty string. The operation cannot fail and is
/// idempotent.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_text("Ｓｎｏｗﬂａｋｅ"), "Snowflake");
/// assert_eq!(normalize_text("naïve résumé"), "naive resume");
/// ```
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    text.nfkd().filter(char::is_ascii).collect()
}

/// Keep at most `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters and suffixed with the number of
/// bytes that were dropped.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let kept = truncate_chars(s, max);
    if kept.len() == s.len() {
        kept
    } else {
        format!("{}…(+{} bytes)", kept, s.len() - kept.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_accents() {
        assert_eq!(normalize_text("Café crème"), "Cafe creme");
        assert_eq!(normalize_text("naïve résumé"), "naive resume");
    }

    #[test]
    fn test_normalize_compatibility_forms() {
        assert_eq!(normalize_text("ﬁle"), "file");
        assert_eq!(normalize_text("Ｓｎｏｗ"), "Snow");
    }

    #[test]
    fn test_normalize_drops_unrepresentable() {
        assert_eq!(normalize_text("Data ❄️ Cloud 🚀"), "Data  Cloud ");
        assert_eq!(normalize_text("東京"), "");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "plain ascii",
            "Ünïcödé — “quotes” and ‘apostrophes’",
            "ｆｕｌｌｗｉｄｔｈ ① ½",
            "line\nbreaks\tand tabs",
            "",
        ];
        for s in samples {
            let once = normalize_text(s);
            assert_eq!(normalize_text(&once), once, "input: {s:?}");
        }
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 5), "hello");
        assert_eq!(truncate_chars("hello", 2), "he");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars(&"x".repeat(250), 200).chars().count(), 200);
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }
}
