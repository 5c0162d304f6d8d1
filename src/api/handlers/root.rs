//! Console landing page and the session fragment it refreshes.

use super::auth::{AuthState, login::escape_html};
use crate::api::middleware::{AuthUser, CsrfToken, csrf::FORM_FIELD as CSRF_FIELD};
use axum::{extract::Extension, response::Html};
use std::sync::Arc;

pub async fn home(
    Extension(state): Extension<Arc<AuthState>>,
    AuthUser(user): AuthUser,
    csrf: CsrfToken,
) -> Html<String> {
    let mut headers = serde_json::Map::new();
    headers.insert(
        state.csrf().header_name().as_str().to_string(),
        serde_json::Value::String(csrf.as_str().to_string()),
    );
    let hx_headers = serde_json::Value::Object(headers).to_string();
    let logout = state.config().route("logout");
    let fragment = state.config().route("fragments/session");

    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Console</title></head>
<body hx-headers="{hx_headers}">
<header>
<span id="session" hx-get="{fragment}" hx-trigger="every 60s">{who}</span>
<form method="post" action="{logout}" hx-post="{logout}">
<input type="hidden" name="{csrf_field}" value="{csrf_token}">
<button type="submit">Log out</button>
</form>
</header>
</body>
</html>
"#,
        hx_headers = escape_html(&hx_headers),
        fragment = escape_html(&fragment),
        logout = escape_html(&logout),
        csrf_field = CSRF_FIELD,
        csrf_token = escape_html(csrf.as_str()),
        who = escape_html(&user.email),
    ))
}

/// Fragment showing who is signed in; partial-update requests only.
pub async fn session_fragment(AuthUser(user): AuthUser) -> Html<String> {
    let roles = if user.roles.is_empty() {
        String::new()
    } else {
        format!(" ({})", escape_html(&user.roles.join(", ")))
    };
    Html(format!(
        "<span id=\"session\">{}{roles}</span>",
        escape_html(&user.email)
    ))
}
