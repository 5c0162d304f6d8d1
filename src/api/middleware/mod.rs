//! Request-scoped layers: `partial-update detector -> session -> auth -> csrf`.
//!
//! Each layer publishes a typed value in the request extensions
//! ([`PartialUpdate`], [`SessionHandle`](crate::session::SessionHandle),
//! [`AuthUser`], [`CsrfToken`]) with a matching extractor.

pub mod auth;
pub mod credential;
pub mod csrf;
pub mod partial;

pub use self::auth::{AuthUser, require_auth};
pub use self::csrf::{CsrfConfig, CsrfToken, protect};
pub use self::partial::{PartialUpdate, detect_partial_update, require_partial_update};
