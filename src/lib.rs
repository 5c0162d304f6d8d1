//! # Sentinel (operations console session & auth gateway)
//!
//! `sentinel` guards a server-rendered administrative console. It owns the
//! stateless session cookie, bearer credential validation through an injected
//! [`authenticator::Authenticator`], double-submit CSRF protection and the
//! login/logout flow with open-redirect-safe post-login targets.
//!
//! ## Request modes
//!
//! Every request is classified once by the partial-update detector (the
//! `HX-Request` header). Denials are delivered as a `302` to the login page for
//! full-page navigations, or as `401` plus an `HX-Redirect` instruction for
//! partial-update clients, since those cannot follow a body-less redirect.
//!
//! ## Session cookie
//!
//! The session is serialized, signed with an HMAC-SHA256 `hash key` and then
//! sealed with AES-256-GCM-SIV under an independent `block key`. There is no
//! server-side session table: a missing, expired or tampered cookie always
//! yields a fresh anonymous session.
//!
//! ## Middleware order
//!
//! `partial-update detector -> session -> auth -> csrf -> handler`, with the
//! session persisted on the way out.

pub mod api;
pub mod authenticator;
pub mod cli;
pub mod cookies;
pub mod session;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
