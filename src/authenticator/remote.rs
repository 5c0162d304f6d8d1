//! HTTP-backed [`Authenticator`].
//!
//! `POST <base>/verify` with `{"token": "..."}`:
//!
//! - `200` with an [`Identity`] body accepts the credential.
//! - `401` with `{"reason": "..."}` rejects it with a typed reason.
//! - `401` without a usable body rejects it as unauthorized.
//! - Anything else, including transport failures, is `Unavailable`.

use super::{AuthError, Authenticator, AuthenticatorError, Identity};
use crate::APP_USER_AGENT;
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Clone)]
pub struct RemoteAuthenticator {
    verify_url: Url,
    client: Client,
}

impl RemoteAuthenticator {
    /// # Errors
    /// Returns an error if `base_url` is not an absolute http(s) URL or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url).context("invalid authenticator URL")?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("authenticator URL must use http or https: {base_url}");
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let verify_url = base.join("verify").context("invalid authenticator URL")?;

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build authenticator HTTP client")?;

        Ok(Self { verify_url, client })
    }

    #[must_use]
    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }
}

#[async_trait]
impl Authenticator for RemoteAuthenticator {
    #[instrument(skip(self, headers, credential), fields(url = %self.verify_url))]
    async fn authenticate(
        &self,
        headers: &HeaderMap,
        credential: &str,
    ) -> Result<Identity, AuthenticatorError> {
        let mut request = self
            .client
            .post(self.verify_url.clone())
            .json(&VerifyRequest { token: credential });

        if let Some(request_id) = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            request = request.header(REQUEST_ID_HEADER, request_id);
        }

        let response = request.send().await.map_err(|err| {
            error!("Authenticator request failed: {err}");
            AuthenticatorError::Unavailable(err.to_string())
        })?;

        match response.status() {
            StatusCode::OK => response.json::<Identity>().await.map_err(|err| {
                error!("Authenticator returned an unreadable identity: {err}");
                AuthenticatorError::Unavailable(err.to_string())
            }),
            StatusCode::UNAUTHORIZED => {
                let body = response.bytes().await.unwrap_or_default();
                match serde_json::from_slice::<AuthError>(&body) {
                    Ok(err) => {
                        debug!("Authenticator rejected credential: {}", err.reason);
                        Err(AuthenticatorError::Rejected(err))
                    }
                    Err(_) => Err(AuthenticatorError::Unauthorized),
                }
            }
            status => {
                error!("Authenticator answered with unexpected status {status}");
                Err(AuthenticatorError::Unavailable(format!(
                    "unexpected status {status}"
                )))
            }
        }
    }
}
