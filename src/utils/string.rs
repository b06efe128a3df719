//! UTF-8 safe string helpers.
//!
//! Message bodies arrive in every script under the sun, so nothing here slices
//! by byte index.

/// Short single-line preview of `s` for log fields.
///
/// Newlines are flattened to spaces and anything past `n` chars is replaced
/// by `...`.
pub fn preview(s: &str, n: usize) -> String {
    let mut out: String = s
        .chars()
        .take(n)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if s.chars().nth(n).is_some() {
        out.push_str("...");
    }
    out
}

/// Cap `s` at `max` chars, ending with `suffix` when it had to be cut.
///
/// The result, suffix included, is never longer than `max` chars.
pub fn truncate_with_suffix(s: &str, max: usize, suffix: &str) -> String {
    if s.chars().nth(max).is_none() {
        return s.to_string();
    }
    let keep = max.saturating_sub(suffix.chars().count());
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(suffix);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_ascii() {
        assert_eq!(preview("hello world", 5), "hello...");
        assert_eq!(preview("hello world", 20), "hello world");
        assert_eq!(preview("hello", 5), "hello");
    }

    #[test]
    fn preview_flattens_newlines() {
        assert_eq!(preview("a\nb\r\nc", 10), "a b  c");
    }

    #[test]
    fn preview_multibyte() {
        let s = "Olá, tudo bem? 你好世界";
        let p = preview(s, 16);
        assert_eq!(p.chars().count(), 19);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn truncate_short_unchanged() {
        assert_eq!(truncate_with_suffix("short", 10, "..."), "short");
        assert_eq!(truncate_with_suffix("exactly10!", 10, "..."), "exactly10!");
    }

    #[test]
    fn truncate_long_respects_max() {
        let long = "é".repeat(50);
        let out = truncate_with_suffix(&long, 20, "...(truncated)");
        assert_eq!(out.chars().count(), 20);
        assert!(out.ends_with("...(truncated)"));
        assert!(out.starts_with("éééééé"));
    }
}
