//! Partial-update (HTMX) request classification and navigation responses.

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::LOCATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use tracing::error;

pub const HX_REQUEST: HeaderName = HeaderName::from_static("hx-request");
pub const HX_REDIRECT: HeaderName = HeaderName::from_static("hx-redirect");
pub const HX_REFRESH: HeaderName = HeaderName::from_static("hx-refresh");

/// Whether the caller expects a fragment rather than a full document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartialUpdate(pub bool);

impl PartialUpdate {
    #[must_use]
    pub const fn is_partial(self) -> bool {
        self.0
    }
}

#[must_use]
pub fn is_partial_update(headers: &HeaderMap) -> bool {
    headers
        .get(HX_REQUEST)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}

impl<S> FromRequestParts<S> for PartialUpdate
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .copied()
            .unwrap_or_else(|| Self(is_partial_update(&parts.headers))))
    }
}

/// Classify the request once and store the result for downstream layers.
pub async fn detect_partial_update(mut request: Request, next: Next) -> Response {
    let partial = PartialUpdate(is_partial_update(request.headers()));
    request.extensions_mut().insert(partial);
    next.run(request).await
}

/// Guard for fragment-only routes: untagged requests get 400.
pub async fn require_partial_update(
    partial: PartialUpdate,
    request: Request,
    next: Next,
) -> Response {
    if partial.is_partial() {
        next.run(request).await
    } else {
        (StatusCode::BAD_REQUEST, "partial update requests only").into_response()
    }
}

/// Plain `Location` redirect with an explicit status.
#[must_use]
pub fn redirect(location: &str, status: StatusCode) -> Response {
    with_header(status, LOCATION, location)
}

/// Client-side navigation instruction for partial-update callers.
#[must_use]
pub fn hx_redirect(location: &str, status: StatusCode) -> Response {
    with_header(status, HX_REDIRECT, location)
}

/// Send the caller to `location` the way its request mode understands:
/// `204` + `HX-Redirect` for partial updates, a `Location` redirect otherwise.
#[must_use]
pub fn navigate(partial: PartialUpdate, location: &str, status: StatusCode) -> Response {
    if partial.is_partial() {
        hx_redirect(location, StatusCode::NO_CONTENT)
    } else {
        redirect(location, status)
    }
}

fn with_header(status: StatusCode, name: HeaderName, location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (status, [(name, value)]).into_response(),
        Err(err) => {
            error!("Invalid navigation target: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::{Router, body::Body, http::Request as HttpRequest, middleware, routing::get};
    use tower::ServiceExt;

    #[test]
    fn detects_hx_request_header() {
        let mut headers = HeaderMap::new();
        assert!(!is_partial_update(&headers));
        headers.insert(HX_REQUEST, HeaderValue::from_static("true"));
        assert!(is_partial_update(&headers));
        headers.insert(HX_REQUEST, HeaderValue::from_static("TRUE"));
        assert!(is_partial_update(&headers));
        headers.insert(HX_REQUEST, HeaderValue::from_static("false"));
        assert!(!is_partial_update(&headers));
    }

    #[test]
    fn navigate_by_mode() {
        let response = navigate(PartialUpdate(true), "/admin", StatusCode::SEE_OTHER);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get(HX_REDIRECT).and_then(|v| v.to_str().ok()),
            Some("/admin")
        );
        assert!(response.headers().get(LOCATION).is_none());

        let response = navigate(PartialUpdate(false), "/admin", StatusCode::SEE_OTHER);
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
            Some("/admin")
        );
    }

    #[test]
    fn invalid_location_does_not_panic() {
        let response = redirect("/bad\nheader", StatusCode::FOUND);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/fragment",
                get(|partial: PartialUpdate| async move { format!("{}", partial.is_partial()) })
                    .route_layer(middleware::from_fn(require_partial_update)),
            )
            .layer(middleware::from_fn(detect_partial_update))
    }

    #[tokio::test]
    async fn guard_rejects_full_page_requests() -> Result<()> {
        let response = app()
            .oneshot(HttpRequest::builder().uri("/fragment").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn guard_allows_partial_requests() -> Result<()> {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/fragment")
                    .header(HX_REQUEST, "true")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
