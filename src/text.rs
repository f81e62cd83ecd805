use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<]+?>").unwrap());
static PARENS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^()]*)[()]").unwrap());

pub fn cap_as_str<'a>(re: &Lazy<Regex>, haystack: &'a str, group: usize) -> Option<&'a str> {
    re.captures(haystack)
        .and_then(|c| c.get(group))
        .map(|m| m.as_str())
}

/// Removes anything that looks like a markup tag.
///
/// This is purely textual: nested or malformed markup is stripped on a
/// best-effort basis and no entities are decoded.
pub fn strip_tags(s: &str) -> String {
    TAG_RE.replace_all(s, "").into_owned()
}

/// Normalizes typographic characters that spreadsheets like to insert.
pub fn clean(value: Option<&str>) -> String {
    value
        .map(|s| s.replace('\u{2019}', "'").replace('\u{2013}', "-"))
        .unwrap_or_default()
}

/// Returns the text between the first `(` and the next parenthesis.
pub fn parenthesized(s: &str) -> Option<&str> {
    cap_as_str(&PARENS_RE, s, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags_removes_anchor() {
        let html = r#"You have been granted the Admin role for <a href="/dataverse/root" title="Root">Root</a>."#;
        assert_eq!(
            strip_tags(html),
            "You have been granted the Admin role for Root."
        );
    }

    #[test]
    fn test_strip_tags_is_idempotent() {
        let html = r#"<a href="/dataverse/demo">Demo</a> was created in <b>Root</b> <br/>"#;
        let once = strip_tags(html);
        assert_eq!(strip_tags(&once), once);
    }

    #[test]
    fn test_strip_tags_is_not_html_aware() {
        // `<` inside an attribute starts a new match.
        assert_eq!(strip_tags(r#"<a title="<b>">x</a>"#), r#"<a title="">x"#);
        assert_eq!(strip_tags("1 < 2 and 3 > 2"), "1  2");
        assert_eq!(strip_tags("no markup"), "no markup");
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(None), "");
        assert_eq!(clean(Some("Agency\u{2019}s data \u{2013} 2024")), "Agency's data - 2024");
    }

    #[test]
    fn test_parenthesized() {
        assert_eq!(parenthesized("10.7910/DVN/X (12)"), Some("12"));
        assert_eq!(parenthesized("  (3 hits)</li>"), Some("3 hits"));
        assert_eq!(parenthesized("nothing here"), None);
    }
}
