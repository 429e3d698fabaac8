//! Phone-number redaction for free-text comments.

use std::sync::LazyLock;

use regex::Regex;

/// Numbers with a country/trunk prefix: contiguous or grouped `(ddd) ddd-dd-dd`
static PREFIXED_PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\+7|7|8)\d{10}|(\+7|7|8)[\s\-]?\(?\d{3}\)?[\s\-]?\d{3}[\s\-]?\d{2}[\s\-]?\d{2}").unwrap()
});

/// Raw mobile (`9` + 9 digits) or grouped local form
static LOCAL_PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"9\d{9}|\(?\d{3}\)?[\s\-]?\d{3}[\s\-]?\d{2}[\s\-]?\d{2}").unwrap()
});

/// Remove phone numbers from `text`.
///
/// Prefixed numbers are removed first; the local-form pass only runs when
/// no prefixed number was found, so the tail of a prefixed number is never
/// matched a second time. Whitespace is collapsed and trimmed.
pub fn strip_phone_numbers(text: &str) -> String {
    let mut found = remove_matches(text, &PREFIXED_PHONE_RE);
    if found.is_none() {
        found = remove_matches(text, &LOCAL_PHONE_RE);
    }
    let stripped = found.unwrap_or_else(|| text.to_string());
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Matches are taken from the original text and each removes its first
/// occurrence from the result. None when nothing matched.
fn remove_matches(text: &str, re: &Regex) -> Option<String> {
    let matches: Vec<&str> = re.find_iter(text).map(|m| m.as_str()).collect();
    if matches.is_empty() {
        return None;
    }
    let mut result = text.to_string();
    for m in matches {
        log::debug!("phone removed: {m:?}");
        result = result.replacen(m, "", 1);
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_prefixed_contiguous() {
        assert_eq!(strip_phone_numbers("звонить +79111234567 заранее"), "звонить заранее");
        assert_eq!(strip_phone_numbers("89111234567"), "");
    }

    #[test]
    fn removes_prefixed_grouped() {
        assert_eq!(strip_phone_numbers("тел 8 (911) 123-45-67, вход 2"), "тел , вход 2");
        assert_eq!(strip_phone_numbers("+7-911-123-45-67 Иван"), "Иван");
    }

    #[test]
    fn removes_local_when_no_prefixed() {
        assert_eq!(strip_phone_numbers("Иван 9111234567"), "Иван");
        assert_eq!(strip_phone_numbers("(911) 123-45-67 у входа"), "у входа");
    }

    #[test]
    fn local_pass_skipped_after_prefixed_hit() {
        // The second number is local-form; it stays because a prefixed one was found
        let out = strip_phone_numbers("+79111234567 и 912 345-67-89");
        assert_eq!(out, "и 912 345-67-89");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(strip_phone_numbers("  зсд   300\tвкл "), "зсд 300 вкл");
        assert_eq!(strip_phone_numbers("встреча\u{a0}\n+79111234567 у входа"), "встреча у входа");
    }

    #[test]
    fn short_numbers_are_kept() {
        assert_eq!(strip_phone_numbers("парковка 300 вкл"), "парковка 300 вкл");
    }
}
