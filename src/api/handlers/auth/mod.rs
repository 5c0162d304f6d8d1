//! Login/logout orchestration.
//!
//! The login handlers hold the session store and the authenticator directly,
//! so they never depend on the auth middleware's deny branching.
//!
//! ## Cookies
//!
//! - session cookie: sealed [`Session`](crate::session::Session), `HttpOnly`.
//! - auth cookie (default `Authorization`): `"Bearer <token>"`, `HttpOnly`,
//!   persistent only with remember-me.
//! - CSRF cookie: random token readable by page scripts, rotated on login.

pub mod login;
pub mod logout;
pub mod messages;
pub mod redirect;
mod state;

pub use state::{AuthConfig, AuthState};
