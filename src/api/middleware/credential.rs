use crate::cookies;
use axum::http::{HeaderMap, header::AUTHORIZATION};

/// Bearer credential from the `Authorization` header, falling back to the
/// auth cookie. The cookie value may carry its own `Bearer ` prefix.
#[must_use]
pub fn resolve(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(strip_bearer)
        .or_else(|| {
            cookies::read(headers, cookie_name).and_then(|value| {
                let value = value.trim();
                strip_bearer(value).or_else(|| (!value.is_empty()).then(|| value.to_string()))
            })
        })
}

fn strip_bearer(value: &str) -> Option<String> {
    let value = value.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Token without any `Bearer ` prefix.
#[must_use]
pub fn without_bearer(value: &str) -> String {
    strip_bearer(value).unwrap_or_else(|| value.trim().to_string())
}

/// `Bearer `-prefix a token unless it already carries one.
#[must_use]
pub fn bearer_value(token: &str) -> String {
    if strip_bearer(token).is_some() {
        token.trim().to_string()
    } else {
        format!("Bearer {}", token.trim())
    }
}
