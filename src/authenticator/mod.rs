//! Credential validation contract.
//!
//! The identity provider is an injected collaborator: the auth middleware and
//! the login handler hold an `Arc<dyn Authenticator>` and never look one up
//! from ambient state.

pub mod remote;

pub use self::remote::RemoteAuthenticator;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr, time::Duration};
use tracing::warn;

/// Closed set of authentication failure reasons.
///
/// The wire form (`as_str`) is what travels in the login page `reason` query
/// parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthFailureReason {
    MissingToken,
    TokenInvalid,
    TokenExpired,
    #[default]
    Unspecified,
}

impl AuthFailureReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::TokenInvalid => "token_invalid",
            Self::TokenExpired => "token_expired",
            Self::Unspecified => "auth_failed",
        }
    }
}

impl fmt::Display for AuthFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthFailureReason {
    type Err = std::convert::Infallible;

    /// Unknown codes collapse to [`AuthFailureReason::Unspecified`].
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim() {
            "missing_token" => Self::MissingToken,
            "token_invalid" => Self::TokenInvalid,
            "token_expired" => Self::TokenExpired,
            _ => Self::Unspecified,
        })
    }
}

impl Serialize for AuthFailureReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuthFailureReason {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(value.parse().unwrap_or_default())
    }
}

/// Typed failure reported by an [`Authenticator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("authentication failed: {reason}")]
pub struct AuthError {
    pub reason: AuthFailureReason,
}

impl AuthError {
    #[must_use]
    pub const fn new(reason: AuthFailureReason) -> Self {
        Self { reason }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthenticatorError {
    /// The provider rejected the credential with a typed reason.
    #[error(transparent)]
    Rejected(#[from] AuthError),
    /// The provider rejected the credential without saying why.
    #[error("credential not accepted")]
    Unauthorized,
    /// The provider could not be reached or answered nonsense.
    #[error("authenticator unavailable: {0}")]
    Unavailable(String),
}

impl AuthenticatorError {
    /// Reason surfaced to the user for this failure.
    #[must_use]
    pub const fn reason(&self) -> AuthFailureReason {
        match self {
            Self::Rejected(err) => err.reason,
            Self::Unauthorized => AuthFailureReason::TokenInvalid,
            Self::Unavailable(_) => AuthFailureReason::Unspecified,
        }
    }
}

/// Identity returned by a successful authentication.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Token to keep for the session. Empty means "keep the presented one".
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub feature_flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .field("feature_flags", &self.feature_flags)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Validate `credential` presented with the given request headers.
    async fn authenticate(
        &self,
        headers: &HeaderMap,
        credential: &str,
    ) -> Result<Identity, AuthenticatorError>;
}

/// Run an authentication bounded by `timeout`. Never retried.
///
/// # Errors
/// Returns the authenticator's error, or `Unavailable` when the call times out.
pub async fn authenticate_with_timeout(
    authenticator: &dyn Authenticator,
    headers: &HeaderMap,
    credential: &str,
    timeout: Duration,
) -> Result<Identity, AuthenticatorError> {
    match tokio::time::timeout(timeout, authenticator.authenticate(headers, credential)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Authenticator did not answer within {}ms", timeout.as_millis());
            Err(AuthenticatorError::Unavailable("timed out".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl Authenticator for Slow {
        async fn authenticate(
            &self,
            _headers: &HeaderMap,
            _credential: &str,
        ) -> Result<Identity, AuthenticatorError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Identity::default())
        }
    }

    #[test]
    fn reason_codes() {
        for reason in [
            AuthFailureReason::MissingToken,
            AuthFailureReason::TokenInvalid,
            AuthFailureReason::TokenExpired,
            AuthFailureReason::Unspecified,
        ] {
            assert_eq!(reason.as_str().parse::<AuthFailureReason>(), Ok(reason));
        }
        assert_eq!(
            "something_else".parse::<AuthFailureReason>(),
            Ok(AuthFailureReason::Unspecified)
        );
    }

    #[test]
    fn error_classification() {
        assert_eq!(
            AuthenticatorError::from(AuthError::new(AuthFailureReason::TokenExpired)).reason(),
            AuthFailureReason::TokenExpired
        );
        assert_eq!(
            AuthenticatorError::Unauthorized.reason(),
            AuthFailureReason::TokenInvalid
        );
        assert_eq!(
            AuthenticatorError::Unavailable("down".to_string()).reason(),
            AuthFailureReason::Unspecified
        );
    }

    #[test]
    fn auth_error_deserializes_unknown_reason_as_default() {
        let err: AuthError = serde_json::from_str(r#"{"reason":"weird"}"#).unwrap();
        assert_eq!(err.reason, AuthFailureReason::Unspecified);
        let err: AuthError = serde_json::from_str(r#"{"reason":"token_expired"}"#).unwrap();
        assert_eq!(err.reason, AuthFailureReason::TokenExpired);
    }

    #[test]
    fn identity_debug_hides_tokens() {
        let identity = Identity {
            uid: "u".to_string(),
            token: "secret".to_string(),
            refresh_token: Some("refresh-secret".to_string()),
            ..Identity::default()
        };
        let rendered = format!("{identity:?}");
        assert!(!rendered.contains("secret"));
    }

    #[tokio::test]
    async fn slow_authenticator_times_out() {
        let result =
            authenticate_with_timeout(&Slow, &HeaderMap::new(), "tok", Duration::from_millis(20))
                .await;
        assert!(matches!(result, Err(AuthenticatorError::Unavailable(_))));
    }
}
