use super::{Session, SessionStore, SessionUser};
use crate::cookies;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::error;

#[derive(Debug)]
struct Slot {
    session: Session,
    destroyed: bool,
}

/// Request-scoped handle to the active session.
///
/// Inserted by [`load_session`]; every clone points at the same session, which
/// is written back to the response once the inner service returns.
#[derive(Debug, Clone)]
pub struct SessionHandle(Arc<Mutex<Slot>>);

impl SessionHandle {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(Slot {
            session,
            destroyed: false,
        })))
    }

    /// Snapshot of the current session.
    pub async fn get(&self) -> Session {
        self.0.lock().await.session.clone()
    }

    pub async fn user(&self) -> Option<SessionUser> {
        self.0.lock().await.session.user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.0.lock().await.session.is_authenticated()
    }

    pub async fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut slot = self.0.lock().await;
        f(&mut slot.session)
    }

    /// Clear the session and expire its cookie on the way out.
    pub async fn destroy(&self) {
        let mut slot = self.0.lock().await;
        slot.session = Session::anonymous(OffsetDateTime::now_utc());
        slot.destroyed = true;
    }

    pub async fn is_destroyed(&self) -> bool {
        self.0.lock().await.destroyed
    }

    /// Write the session cookie (or its expiry) into `headers`.
    pub async fn persist(&self, store: &SessionStore, tls: bool, headers: &mut HeaderMap) {
        let mut slot = self.0.lock().await;
        let secure = store.config().security().secure_for(tls);

        if slot.destroyed {
            cookies::append(headers, &store.destroy_cookie(secure));
            return;
        }

        match store.save(&mut slot.session, secure) {
            Ok(cookie) => cookies::append(headers, &cookie),
            Err(err) => error!("Failed to persist session: {err}"),
        }
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "session layer is not installed",
        ))
    }
}

/// Load the session for every request and persist it on the response.
pub async fn load_session(
    State(store): State<SessionStore>,
    mut request: Request,
    next: Next,
) -> Response {
    let tls = cookies::is_tls_request(request.headers(), request.uri());
    let handle = SessionHandle::new(store.load(request.headers()));
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;
    handle.persist(&store, tls, response.headers_mut()).await;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionConfig, SessionKeys};
    use anyhow::{Context, Result};
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{
            HeaderValue, Request,
            header::{COOKIE, SET_COOKIE},
        },
        middleware,
        routing::{get, post},
    };
    use tower::ServiceExt;

    fn store() -> Result<SessionStore> {
        Ok(SessionStore::new(
            SessionConfig::new("sentinel_session"),
            SessionKeys::new(vec![5u8; 32], vec![6u8; 32])?,
        ))
    }

    fn app(store: SessionStore) -> Router {
        Router::new()
            .route(
                "/login",
                post(|session: SessionHandle| async move {
                    session
                        .update(|s| {
                            s.sign_in(
                                SessionUser {
                                    uid: "u-1".to_string(),
                                    email: "ops@example.com".to_string(),
                                    roles: vec![],
                                    token: "tok".to_string(),
                                },
                                false,
                                None,
                                OffsetDateTime::now_utc(),
                            );
                        })
                        .await;
                    StatusCode::NO_CONTENT
                }),
            )
            .route(
                "/whoami",
                get(|session: SessionHandle| async move {
                    session
                        .user()
                        .await
                        .map_or_else(|| "anonymous".to_string(), |u| u.email)
                }),
            )
            .route(
                "/logout",
                post(|session: SessionHandle| async move {
                    session.destroy().await;
                    StatusCode::NO_CONTENT
                }),
            )
            .layer(middleware::from_fn_with_state(store, load_session))
    }

    fn session_cookie(response: &Response) -> Result<String> {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("sentinel_session="))
            .map(ToString::to_string)
            .context("missing session cookie")
    }

    fn pair(set_cookie: &str) -> Result<HeaderValue> {
        let pair = set_cookie.split(';').next().context("empty cookie")?;
        Ok(HeaderValue::from_str(pair)?)
    }

    async fn body_string(response: Response) -> Result<String> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    #[tokio::test]
    async fn session_round_trips_through_the_cookie() -> Result<()> {
        let app = app(store()?);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .body(Body::empty())?,
            )
            .await?;
        let cookie = session_cookie(&response)?;
        assert!(cookie.contains("HttpOnly"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(COOKIE, pair(&cookie)?)
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(body_string(response).await?, "ops@example.com");
        Ok(())
    }

    #[tokio::test]
    async fn destroyed_session_expires_cookie_and_is_anonymous_afterwards() -> Result<()> {
        let app = app(store()?);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .body(Body::empty())?,
            )
            .await?;
        let login_cookie = session_cookie(&response)?;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/logout")
                    .header(COOKIE, pair(&login_cookie)?)
                    .body(Body::empty())?,
            )
            .await?;
        let cleared = session_cookie(&response)?;
        assert!(cleared.contains("Max-Age=0"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(COOKIE, pair(&cleared)?)
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(body_string(response).await?, "anonymous");
        Ok(())
    }

    #[tokio::test]
    async fn secure_flag_follows_forwarded_proto() -> Result<()> {
        let response = app(store()?)
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header("x-forwarded-proto", "https")
                    .body(Body::empty())?,
            )
            .await?;
        assert!(session_cookie(&response)?.contains("Secure"));
        Ok(())
    }

    #[tokio::test]
    async fn extractor_without_layer_is_an_internal_error() -> Result<()> {
        let app = Router::new().route("/", get(|_session: SessionHandle| async { "ok" }));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }
}
