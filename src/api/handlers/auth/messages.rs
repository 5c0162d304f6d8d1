//! User-facing login page messages.
//!
//! One table serves both the failed submission and the `?reason=` redirect.

use crate::authenticator::AuthFailureReason;

pub const LOGGED_OUT: &str = "You have been logged out.";
pub const MISSING_CREDENTIAL: &str = "Please provide a credential token.";
pub const MALFORMED_SUBMISSION: &str = "The login form could not be read, please try again.";

#[must_use]
pub const fn for_reason(reason: AuthFailureReason) -> &'static str {
    match reason {
        AuthFailureReason::TokenExpired => "Session expired, please log in again.",
        AuthFailureReason::MissingToken => "Missing credentials.",
        AuthFailureReason::TokenInvalid | AuthFailureReason::Unspecified => {
            "Authentication failed."
        }
    }
}

/// Message for the login page query string: `status` wins over `reason`.
#[must_use]
pub fn from_query(status: Option<&str>, reason: Option<&str>) -> Option<&'static str> {
    if status.is_some_and(|value| value.trim() == "logged_out") {
        return Some(LOGGED_OUT);
    }
    reason
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| for_reason(value.parse().unwrap_or_default()))
}
