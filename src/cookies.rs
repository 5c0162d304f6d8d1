//! Cookie helpers shared by the session, auth and CSRF layers.

use axum::http::{
    HeaderMap, HeaderValue, Uri,
    header::{COOKIE, SET_COOKIE},
};
use cookie::{Cookie, SameSite};
use time::{Duration, OffsetDateTime};
use tracing::error;

/// Read a cookie value from the request, stripping optional surrounding quotes.
///
/// Quoted values are produced for values containing spaces (e.g. `"Bearer abc"`).
#[must_use]
pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value.to_string()))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| unquote(cookie.value()).to_string())
}

/// Append a `Set-Cookie` header. Cookies that cannot be expressed as a header are dropped.
pub fn append(headers: &mut HeaderMap, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(err) => error!("Failed to encode cookie {}: {err}", cookie.name()),
    }
}

/// Whether the request reached us over TLS, directly or through a terminating proxy.
#[must_use]
pub fn is_tls_request(headers: &HeaderMap, uri: &Uri) -> bool {
    if uri.scheme_str() == Some("https") {
        return true;
    }
    headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// Build a cookie that removes `name` from the browser.
///
/// Sets both `Max-Age=0` and an `Expires` in the past so clients ignoring
/// `Max-Age` drop it as well.
#[must_use]
pub fn expired(name: &str, path: &str, domain: Option<&str>, secure: bool) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_string(), String::new()))
        .path(path.to_string())
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH);

    if let Some(domain) = domain {
        builder = builder.domain(domain.to_string());
    }

    builder.build()
}

/// Quote a cookie value when it contains characters browsers would reject unquoted.
#[must_use]
pub fn quote_if_needed(value: &str) -> String {
    if value.contains(' ') || value.contains(',') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}
