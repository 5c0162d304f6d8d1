//! Double-submit CSRF protection.
//!
//! The token lives in its own cookie, independent of the session, so anonymous
//! visitors (e.g. the login form) carry one as well. Unsafe methods must echo
//! the cookie value in the configured header. Plain HTML form posts, which
//! cannot set headers, may send it as the `csrf_token` field instead.

use crate::{api::handlers::auth::AuthState, cookies, session::CookieSecurity};
use axum::{
    Extension,
    body::{Body, to_bytes},
    extract::{FromRequestParts, Request},
    http::{HeaderMap, HeaderName, Method, StatusCode, header::CONTENT_TYPE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use cookie::{Cookie, SameSite};
use rand::{RngCore, rngs::OsRng};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;
use url::form_urlencoded;

const TOKEN_BYTES: usize = 32;

/// Form field carrying the token when the header is absent.
pub const FORM_FIELD: &str = "csrf_token";

// Largest form body buffered while looking for the token field.
const FORM_LIMIT: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct CsrfConfig {
    cookie_name: String,
    header_name: HeaderName,
    path: String,
    domain: Option<String>,
    security: CookieSecurity,
}

impl CsrfConfig {
    #[must_use]
    pub fn new(cookie_name: impl Into<String>, header_name: HeaderName) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            header_name,
            path: "/".to_string(),
            domain: None,
            security: CookieSecurity::Auto,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain.filter(|value| !value.trim().is_empty());
        self
    }

    #[must_use]
    pub const fn with_security(mut self, security: CookieSecurity) -> Self {
        self.security = security;
        self
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub const fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    /// Token cookie, readable by page scripts so they can echo it.
    #[must_use]
    pub fn cookie(&self, token: &str, tls: bool) -> Cookie<'static> {
        let mut builder = Cookie::build((self.cookie_name.clone(), token.to_string()))
            .path(self.path.clone())
            .http_only(false)
            .secure(self.security.secure_for(tls))
            .same_site(SameSite::Lax);

        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }

        builder.build()
    }

    #[must_use]
    pub fn expired_cookie(&self, tls: bool) -> Cookie<'static> {
        cookies::expired(
            &self.cookie_name,
            &self.path,
            self.domain.as_deref(),
            self.security.secure_for(tls),
        )
    }
}

/// CSRF token of the current request, for embedding in forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(pub String);

impl CsrfToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "csrf layer is not installed",
        ))
    }
}

#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

fn tokens_match(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

fn is_safe_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD || method == Method::OPTIONS
}

fn header_token(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}

/// Token from the `csrf_token` form field; the buffered body is put back for
/// the handler.
async fn form_token(request: Request) -> (Request, Option<String>) {
    let (parts, body) = request.into_parts();
    let Ok(bytes) = to_bytes(body, FORM_LIMIT).await else {
        return (Request::from_parts(parts, Body::empty()), None);
    };

    let token = form_urlencoded::parse(&bytes)
        .find(|(name, _)| name == FORM_FIELD)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty());

    (Request::from_parts(parts, Body::from(bytes)), token)
}

/// Issue the token on safe methods, verify it on everything else.
pub async fn protect(
    Extension(state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let config = state.csrf();
    let tls = cookies::is_tls_request(request.headers(), request.uri());
    let existing =
        cookies::read(request.headers(), config.cookie_name()).filter(|value| !value.is_empty());

    if is_safe_method(request.method()) {
        let minted = existing.is_none();
        let token = existing.unwrap_or_else(generate_token);
        request.extensions_mut().insert(CsrfToken(token.clone()));

        let mut response = next.run(request).await;
        if minted {
            cookies::append(response.headers_mut(), &config.cookie(&token, tls));
        }
        return response;
    }

    let mut presented = header_token(request.headers(), config.header_name());
    if presented.is_none() && existing.is_some() && is_form(request.headers()) {
        let (buffered, token) = form_token(request).await;
        request = buffered;
        presented = token;
    }

    match (existing, presented) {
        (Some(expected), Some(presented)) if tokens_match(&expected, &presented) => {
            request.extensions_mut().insert(CsrfToken(expected));
            next.run(request).await
        }
        _ => {
            warn!(
                method = %request.method(),
                path = request.uri().path(),
                "CSRF validation failed"
            );
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
    }
}
