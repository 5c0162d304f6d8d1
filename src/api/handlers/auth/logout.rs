use super::AuthState;
use crate::{
    api::middleware::{PartialUpdate, partial::navigate},
    cookies,
    session::SessionHandle,
};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode, Uri},
    response::Response,
};
use std::sync::Arc;
use tracing::info;
use url::form_urlencoded;

/// `POST <base>/logout`: drop the session and both auth cookies, then go back
/// to the login page with `status=logged_out`.
pub async fn logout(
    Extension(state): Extension<Arc<AuthState>>,
    partial: PartialUpdate,
    session: SessionHandle,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    if let Some(user) = session.user().await {
        info!(uid = %user.uid, "logout");
    }
    session.destroy().await;

    let config = state.config();
    let tls = cookies::is_tls_request(&headers, &uri);
    let secure = state.sessions().config().security().secure_for(tls);

    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("status", "logged_out")
        .finish();
    let location = format!("{}?{query}", config.login_path());

    let mut response = navigate(partial, &location, StatusCode::SEE_OTHER);
    cookies::append(
        response.headers_mut(),
        &cookies::expired(
            config.auth_cookie_name(),
            config.base_path(),
            state.sessions().config().domain(),
            secure,
        ),
    );
    cookies::append(response.headers_mut(), &state.csrf().expired_cookie(tls));
    response
}
