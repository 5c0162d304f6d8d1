//! Auth middleware: resolve the bearer credential, validate it through the
//! injected [`Authenticator`](crate::authenticator::Authenticator) and attach the
//! identity to the session, or deny in the caller's request mode.

use super::{
    credential,
    partial::{HX_REFRESH, PartialUpdate, hx_redirect, redirect},
};
use crate::{
    api::handlers::auth::{AuthConfig, AuthState},
    authenticator::{AuthFailureReason, Identity, authenticate_with_timeout},
    session::{Session, SessionHandle, SessionUser},
};
use axum::{
    Extension,
    extract::{FromRequestParts, Request},
    http::{HeaderValue, StatusCode, Uri, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, info};
use url::form_urlencoded;

/// Authenticated user for the current request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub SessionUser);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// Login URL carrying the failure reason and the page to come back to.
#[must_use]
pub fn login_location(config: &AuthConfig, reason: AuthFailureReason, next: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("reason", reason.as_str())
        .append_pair("next", next)
        .finish();
    format!("{}?{query}", config.login_path())
}

/// Merge a fresh identity into the session user.
///
/// The identity's email wins; an empty one keeps the email already on record.
/// An empty identity token keeps the presented credential. When the identity
/// belongs to a different user than the one on record, the provider-owned
/// feature flags and refresh token are replaced instead of merged.
pub(crate) fn merge_identity(
    session: &mut Session,
    identity: Identity,
    fallback_email: &str,
    credential: &str,
) -> SessionUser {
    let switched = session
        .user
        .as_ref()
        .is_some_and(|current| current.uid != identity.uid);
    let email = if identity.email.trim().is_empty() {
        fallback_email.trim().to_string()
    } else {
        identity.email
    };
    let token = if identity.token.is_empty() {
        credential.to_string()
    } else {
        identity.token
    };
    let user = SessionUser {
        uid: identity.uid,
        email,
        roles: identity.roles,
        token,
    };

    if switched {
        session.feature_flags = identity.feature_flags;
        session.refresh_token = identity.refresh_token;
    } else {
        session.feature_flags.extend(identity.feature_flags);
        if identity.refresh_token.is_some() {
            session.refresh_token = identity.refresh_token;
        }
    }
    session.user = Some(user.clone());
    user
}

/// Deny response for the caller's request mode.
///
/// Full-page requests are redirected (302) to the login page. Partial-update
/// requests get 401 with `HX-Redirect`, plus `HX-Refresh` when the token expired.
#[must_use]
pub fn deny(config: &AuthConfig, partial: PartialUpdate, reason: AuthFailureReason, uri: &Uri) -> Response {
    let next = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());
    let location = login_location(config, reason, next);

    if !partial.is_partial() {
        return redirect(&location, StatusCode::FOUND);
    }

    let mut response = hx_redirect(&location, StatusCode::UNAUTHORIZED);
    if reason == AuthFailureReason::TokenExpired {
        response
            .headers_mut()
            .insert(HX_REFRESH, HeaderValue::from_static("true"));
    }
    response
}

/// Gate a route behind a valid bearer credential.
pub async fn require_auth(
    Extension(state): Extension<Arc<AuthState>>,
    partial: PartialUpdate,
    session: SessionHandle,
    mut request: Request,
    next: Next,
) -> Response {
    let config = state.config();

    let reason = match credential::resolve(request.headers(), config.auth_cookie_name()) {
        None => AuthFailureReason::MissingToken,
        Some(credential) => {
            match authenticate_with_timeout(
                state.authenticator(),
                request.headers(),
                &credential,
                config.authenticator_timeout(),
            )
            .await
            {
                Ok(identity) => {
                    let user = session
                        .update(|s| {
                            let fallback = s
                                .user
                                .as_ref()
                                .map(|u| u.email.clone())
                                .unwrap_or_default();
                            merge_identity(s, identity, &fallback, &credential)
                        })
                        .await;
                    debug!(uid = %user.uid, "request authenticated");
                    request.extensions_mut().insert(AuthUser(user));
                    return next.run(request).await;
                }
                Err(err) => {
                    info!(reason = %err.reason(), "authentication failed: {err}");
                    err.reason()
                }
            }
        }
    };

    // A failed check must not leave a stale identity behind.
    session.update(Session::clear_user).await;
    deny(config, partial, reason, request.uri())
}
