//! Post-login redirect target sanitizer.
//!
//! [`sanitize`] never fails loudly: any input it does not like becomes `""` and
//! the caller falls back to the console root.

use super::AuthConfig;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use url::{ParseError, Url};

// Delimiters that decoding may expose inside a path segment.
const PATH: &AsciiSet = &CONTROLS.add(b' ').add(b'%').add(b'?').add(b'#');
const QUERY: &AsciiSet = &CONTROLS.add(b' ');

/// Safe same-origin path for `raw`, or `""`.
///
/// Accepted targets are relative, stay under `base_path` and never point at
/// the login page itself. The query string and fragment are kept.
#[must_use]
pub fn sanitize(base_path: &str, login_path: &str, raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || raw.chars().any(char::is_control) {
        return String::new();
    }

    // Only relative references survive; anything with a scheme parses.
    match Url::parse(raw) {
        Err(ParseError::RelativeUrlWithoutBase) => {}
        _ => return String::new(),
    }

    let (rest, fragment) = split_once_opt(raw, '#');
    let (path, query) = split_once_opt(rest, '?');

    // Protocol-relative reference: `//host/...`.
    if path.starts_with("//") {
        return String::new();
    }

    let path = if path.is_empty() { "/" } else { path };

    // `percent_decode_str` passes malformed escapes through untouched.
    if !valid_escapes(path) {
        return String::new();
    }
    let Ok(decoded) = percent_decode_str(path).decode_utf8() else {
        return String::new();
    };
    if decoded.contains('\\') || decoded.chars().any(char::is_control) {
        return String::new();
    }

    let cleaned = clean_path(&format!("/{decoded}"));
    if cleaned.starts_with("//") {
        return String::new();
    }

    let base = normalize_path(base_path);
    if base != "/" && cleaned != base && !cleaned.starts_with(&format!("{base}/")) {
        return String::new();
    }

    if cleaned == normalize_path(login_path) {
        return String::new();
    }

    // Re-encode so the result parses back to the same path.
    let mut target = utf8_percent_encode(&cleaned, PATH).to_string();
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        target.push('?');
        target.extend(utf8_percent_encode(query, QUERY));
    }
    if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
        target.push('#');
        target.extend(utf8_percent_encode(fragment, QUERY));
    }
    target
}

/// Sanitized target, or the console root when nothing safe remains.
#[must_use]
pub fn safe_target(config: &AuthConfig, raw: Option<&str>) -> String {
    let target = sanitize(config.base_path(), config.login_path(), raw.unwrap_or_default());
    if target.is_empty() {
        config.base_path().to_string()
    } else {
        target
    }
}

/// Leading slash, no trailing slash unless root.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let path = path.trim();
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    if path.len() > 1 {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        path
    }
}

/// Lexical cleanup of a rooted path: collapse separators, drop `.`, resolve
/// `..` without climbing above the root.
#[must_use]
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

fn split_once_opt(value: &str, sep: char) -> (&str, Option<&str>) {
    match value.split_once(sep) {
        Some((head, tail)) => (head, Some(tail)),
        None => (value, None),
    }
}

fn valid_escapes(value: &str) -> bool {
    let mut bytes = value.bytes();
    while let Some(byte) = bytes.next() {
        if byte == b'%' {
            let (Some(hi), Some(lo)) = (bytes.next(), bytes.next()) else {
                return false;
            };
            if !hi.is_ascii_hexdigit() || !lo.is_ascii_hexdigit() {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "/admin";
    const LOGIN: &str = "/admin/login";

    fn s(raw: &str) -> String {
        sanitize(BASE, LOGIN, raw)
    }

    #[test]
    fn accepts_paths_under_base() {
        assert_eq!(s("/admin/orders"), "/admin/orders");
        assert_eq!(s("/admin"), "/admin");
        assert_eq!(s("  /admin/orders  "), "/admin/orders");
        assert_eq!(s("/admin/orders?page=2#top"), "/admin/orders?page=2#top");
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(s(""), "");
        assert_eq!(s("   "), "");
    }

    #[test]
    fn rejects_absolute_and_protocol_relative_urls() {
        for raw in [
            "http://evil.example/x",
            "https://evil.example/admin",
            "HTTP://evil.example",
            "http:/evil.example",
            "javascript:alert(1)",
            "mailto:ops@example.com",
            "//evil.example/admin",
            "///evil.example/admin",
            "//evil.example",
        ] {
            assert_eq!(s(raw), "", "{raw}");
        }
    }

    #[test]
    fn rejects_backslashes() {
        for raw in ["/admin\\evil", "\\\\evil.example", "/\\evil.example", "/admin/%5Cevil"] {
            assert_eq!(s(raw), "", "{raw}");
        }
    }

    #[test]
    fn rejects_control_characters() {
        assert_eq!(s("/admin/orders\r\nSet-Cookie: x=1"), "");
        assert_eq!(s("/admin/%0d%0aSet-Cookie"), "");
    }

    #[test]
    fn rejects_malformed_escapes() {
        assert_eq!(s("/admin/%zz"), "");
        assert_eq!(s("/admin/%4"), "");
        assert_eq!(s("/admin/%ff%fe"), "");
    }

    #[test]
    fn confines_to_base_path() {
        assert_eq!(s("/other"), "");
        assert_eq!(s("/administrator"), "");
        assert_eq!(s("/admin/../other"), "");
        assert_eq!(s("/admin/%2e%2e/other"), "");
        assert_eq!(s("/admin/./orders//1/"), "/admin/orders/1");
    }

    #[test]
    fn decoded_double_slash_is_cleaned_not_followed() {
        assert_eq!(sanitize("/", "/login", "%2f%2fevil.example/y"), "/evil.example/y");
        assert_eq!(s("%2f%2fevil.example/y"), "");
    }

    #[test]
    fn rejects_login_page() {
        assert_eq!(s("/admin/login"), "");
        assert_eq!(s("/admin/login/"), "");
        assert_eq!(s("/admin//login?next=/admin"), "");
        assert_eq!(s("/admin/login/extra"), "/admin/login/extra");
    }

    #[test]
    fn root_base_accepts_any_local_path() {
        assert_eq!(sanitize("/", "/login", "/orders"), "/orders");
        assert_eq!(sanitize("/", "/login", "orders"), "/orders");
        assert_eq!(sanitize("/", "/login", "?tab=2"), "/?tab=2");
        assert_eq!(sanitize("/", "/login", "/login"), "");
    }

    #[test]
    fn reencodes_exposed_delimiters_and_non_ascii() {
        assert_eq!(s("/admin/a%3Fb"), "/admin/a%3Fb");
        assert_eq!(s("/admin/a%2523"), "/admin/a%2523");
        assert_eq!(s("/admin/caf%C3%A9"), "/admin/caf%C3%A9");
        assert_eq!(s("/admin/café?q=é x"), "/admin/caf%C3%A9?q=%C3%A9%20x");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in [
            "/admin/orders",
            "/admin/orders?page=2#top",
            "/admin/a%3Fb",
            "/admin/a%2523",
            "/admin/café?q=é x",
            "/admin/./x/../y",
            "admin/z",
            "/admin/%2e/q",
        ] {
            let once = s(raw);
            assert!(!once.is_empty(), "{raw}");
            assert_eq!(s(&once), once, "{raw}");
        }
    }

    #[test]
    fn safe_target_falls_back_to_base() {
        let config = AuthConfig::new("/admin");
        assert_eq!(safe_target(&config, None), "/admin");
        assert_eq!(safe_target(&config, Some("http://evil.example/x")), "/admin");
        assert_eq!(safe_target(&config, Some("/admin/orders")), "/admin/orders");
    }

    #[test]
    fn normalize_and_clean() {
        assert_eq!(normalize_path("admin/"), "/admin");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("///"), "/");
        assert_eq!(clean_path("/a/b/../../../c"), "/c");
        assert_eq!(clean_path("//a//b/./"), "/a/b");
    }
}
