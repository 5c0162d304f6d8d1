//! Login form and login submission.
//!
//! The submission talks to the authenticator directly instead of going through
//! the auth middleware: there is no session to gate yet.

use super::{
    AuthState, messages,
    redirect::{safe_target, sanitize},
};
use crate::{
    api::middleware::{
        PartialUpdate,
        auth::merge_identity,
        credential::{bearer_value, without_bearer},
        csrf::{self, CsrfToken, generate_token},
        partial::navigate,
    },
    authenticator::authenticate_with_timeout,
    cookies,
    session::SessionHandle,
};
use axum::{
    Form,
    extract::{
        Extension, Query,
        rejection::{FormRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use cookie::{Cookie, SameSite};
use serde::Deserialize;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument};

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
    pub reason: Option<String>,
    pub status: Option<String>,
    pub force: Option<String>,
}

#[derive(Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub token: String,
    pub remember: Option<String>,
    pub next: Option<String>,
}

/// Tolerant checkbox parser: `true`, `1`, `on` and `yes`, any case.
#[must_use]
pub fn parse_bool(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "on" | "yes"
        )
    })
}

/// Login page model.
#[derive(Debug)]
pub struct LoginPage<'a> {
    pub action: &'a str,
    pub next: &'a str,
    pub email: &'a str,
    pub message: Option<&'a str>,
    pub csrf_header: &'a str,
    pub csrf_token: &'a str,
}

impl LoginPage<'_> {
    #[must_use]
    pub fn render(&self) -> String {
        let mut headers = serde_json::Map::new();
        headers.insert(
            self.csrf_header.to_string(),
            serde_json::Value::String(self.csrf_token.to_string()),
        );
        let hx_headers = serde_json::Value::Object(headers).to_string();
        let message = self.message.map_or_else(String::new, |message| {
            format!(
                "<p class=\"message\" role=\"alert\">{}</p>\n",
                escape_html(message)
            )
        });

        format!(
            r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<main>
<h1>Sign in</h1>
{message}<form method="post" action="{action}" hx-post="{action}" hx-headers="{hx_headers}">
<input type="hidden" name="{csrf_field}" value="{csrf_token}">
<input type="hidden" name="next" value="{next}">
<label>Email <input type="email" name="email" value="{email}" autocomplete="username"></label>
<label>Token <input type="password" name="token" autocomplete="current-password" required></label>
<label><input type="checkbox" name="remember" value="on"> Remember me</label>
<button type="submit">Sign in</button>
</form>
</main>
</body>
</html>
"#,
            action = escape_html(self.action),
            hx_headers = escape_html(&hx_headers),
            csrf_field = csrf::FORM_FIELD,
            csrf_token = escape_html(self.csrf_token),
            next = escape_html(self.next),
            email = escape_html(self.email),
        )
    }
}

pub(crate) fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn render_login(
    state: &AuthState,
    csrf: &CsrfToken,
    next: &str,
    email: &str,
    message: Option<&str>,
    status: StatusCode,
) -> Response {
    let page = LoginPage {
        action: state.config().login_path(),
        next,
        email,
        message,
        csrf_header: state.csrf().header_name().as_str(),
        csrf_token: csrf.as_str(),
    };
    (status, Html(page.render())).into_response()
}

/// `GET <login>`: render the form, or skip it for an already signed-in session.
pub async fn login_form(
    Extension(state): Extension<Arc<AuthState>>,
    partial: PartialUpdate,
    session: SessionHandle,
    csrf: CsrfToken,
    query: Result<Query<LoginQuery>, QueryRejection>,
) -> Response {
    let query = query.map(|Query(query)| query).unwrap_or_default();
    let config = state.config();

    if !parse_bool(query.force.as_deref()) && session.is_authenticated().await {
        let target = safe_target(config, query.next.as_deref());
        return navigate(partial, &target, StatusCode::SEE_OTHER);
    }

    let next = sanitize(
        config.base_path(),
        config.login_path(),
        query.next.as_deref().unwrap_or_default(),
    );
    let message = messages::from_query(query.status.as_deref(), query.reason.as_deref());

    render_login(&state, &csrf, &next, "", message, StatusCode::OK)
}

/// `POST <login>`: validate the credential and start the authenticated session.
#[instrument(skip_all)]
pub async fn login_submit(
    Extension(state): Extension<Arc<AuthState>>,
    partial: PartialUpdate,
    session: SessionHandle,
    csrf: CsrfToken,
    headers: HeaderMap,
    uri: Uri,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Response {
    let config = state.config();

    let Ok(Form(form)) = form else {
        return render_login(
            &state,
            &csrf,
            "",
            "",
            Some(messages::MALFORMED_SUBMISSION),
            StatusCode::BAD_REQUEST,
        );
    };

    let email = form.email.trim();
    let remember = parse_bool(form.remember.as_deref());
    let next = sanitize(
        config.base_path(),
        config.login_path(),
        form.next.as_deref().unwrap_or_default(),
    );
    let token = without_bearer(&form.token);

    if token.is_empty() {
        return render_login(
            &state,
            &csrf,
            &next,
            email,
            Some(messages::MISSING_CREDENTIAL),
            StatusCode::BAD_REQUEST,
        );
    }

    let identity = match authenticate_with_timeout(
        state.authenticator(),
        &headers,
        &token,
        config.authenticator_timeout(),
    )
    .await
    {
        Ok(identity) => identity,
        Err(err) => {
            info!(reason = %err.reason(), "login rejected: {err}");
            return render_login(
                &state,
                &csrf,
                &next,
                email,
                Some(messages::for_reason(err.reason())),
                StatusCode::UNAUTHORIZED,
            );
        }
    };

    let now = OffsetDateTime::now_utc();
    let sessions = state.sessions();
    let (user, expires_at) = session
        .update(|s| {
            let refresh_token = identity.refresh_token.clone();
            let user = merge_identity(s, identity, email, &token);
            s.sign_in(user.clone(), remember, refresh_token, now);
            (user, s.issued_at().checked_add(sessions.lifetime_for(s)))
        })
        .await;
    info!(uid = %user.uid, remember, "login succeeded");

    let tls = cookies::is_tls_request(&headers, &uri);
    let secure = sessions.config().security().secure_for(tls);

    let mut auth_cookie = Cookie::build((
        config.auth_cookie_name().to_string(),
        cookies::quote_if_needed(&bearer_value(&user.token)),
    ))
    .path(config.base_path().to_string())
    .http_only(true)
    .secure(secure)
    .same_site(SameSite::Lax);

    if let Some(domain) = sessions.config().domain() {
        auth_cookie = auth_cookie.domain(domain.to_string());
    }

    if let Some(expires_at) = expires_at.filter(|_| remember) {
        let max_age = (expires_at - now + Duration::milliseconds(500)).whole_seconds();
        if max_age > 0 {
            auth_cookie = auth_cookie
                .max_age(Duration::seconds(max_age))
                .expires(expires_at);
        }
    }

    let target = if next.is_empty() {
        config.base_path().to_string()
    } else {
        next
    };

    let mut response = navigate(partial, &target, StatusCode::SEE_OTHER);
    cookies::append(response.headers_mut(), &auth_cookie.build());
    // Fresh CSRF token for the authenticated session.
    cookies::append(
        response.headers_mut(),
        &state.csrf().cookie(&generate_token(), tls),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_is_tolerant() {
        for value in ["true", "TRUE", "1", "on", "On", "yes", " YES "] {
            assert!(parse_bool(Some(value)), "{value}");
        }
        for value in ["false", "0", "off", "no", "", "y"] {
            assert!(!parse_bool(Some(value)), "{value}");
        }
        assert!(!parse_bool(None));
    }

    #[test]
    fn escape_html_escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn login_page_embeds_escaped_values() {
        let page = LoginPage {
            action: "/admin/login",
            next: "/admin/orders?a=1&b=\"2\"",
            email: "<ops@example.com>",
            message: Some("Session expired, please log in again."),
            csrf_header: "x-csrf-token",
            csrf_token: "tok-123",
        };
        let html = page.render();
        assert!(html.contains(r#"action="/admin/login""#));
        assert!(html.contains(r#"value="/admin/orders?a=1&amp;b=&quot;2&quot;""#));
        assert!(html.contains("&lt;ops@example.com&gt;"));
        assert!(html.contains("hx-headers=\"{&quot;x-csrf-token&quot;:&quot;tok-123&quot;}\""));
        assert!(html.contains(r#"<input type="hidden" name="csrf_token" value="tok-123">"#));
        assert!(html.contains("Session expired, please log in again."));
    }

    #[test]
    fn login_page_without_message() {
        let page = LoginPage {
            action: "/login",
            next: "",
            email: "",
            message: None,
            csrf_header: "x-csrf-token",
            csrf_token: "t",
        };
        assert!(!page.render().contains("role=\"alert\""));
    }
}
