use crate::{
    api::{
        handlers::{auth, health, root},
        middleware::{detect_partial_update, protect, require_auth, require_partial_update},
    },
    session::load_session,
};
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;

pub mod handlers;
pub mod middleware;

#[cfg(test)]
pub(crate) mod test_support;

/// Build the console router.
///
/// Layers, outermost first: request id and tracing, partial-update detector,
/// session, then per route auth and CSRF. `/health` sits outside the session
/// chain.
#[must_use]
pub fn router(state: Arc<auth::AuthState>) -> Router {
    let config = state.config();
    let base = config.base_path().to_string();

    let mut protected = Router::new()
        .route(&base, get(root::home))
        .route(
            &config.route("fragments/session"),
            get(root::session_fragment).route_layer(from_fn(require_partial_update)),
        );
    if base != "/" {
        protected = protected.route(&format!("{base}/"), get(root::home));
    }
    let protected = protected
        .route_layer(from_fn(protect))
        .route_layer(from_fn(require_auth));

    let public = Router::new()
        .route(
            config.login_path(),
            get(auth::login::login_form).post(auth::login::login_submit),
        )
        .route(&config.route("logout"), post(auth::logout::logout))
        .route_layer(from_fn(protect));

    let console = protected
        .merge(public)
        .layer(from_fn_with_state(state.sessions().clone(), load_session))
        .layer(from_fn(detect_partial_update));

    console
        .route("/health", get(health::health).options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: Arc<auth::AuthState>) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut signal) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            signal.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
