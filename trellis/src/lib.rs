//! Trellis is a small framework layer for actix-web applications: an
//! opinionated server builder, cookie-session plumbing, Tera template
//! rendering, form field types, and an OAuth2 social-login engine behind
//! the `oauth` feature.

#[macro_use]
extern crate log;

pub mod accounts;
pub mod error;
pub mod forms;
pub mod http;
#[cfg(feature = "oauth")]
pub mod oauth;
pub mod prelude;
pub mod request;
mod server;
pub mod templates;

pub use error::Error;
pub use server::Server;

// Re-exported so applications don't need to pin matching versions.
pub use actix_session;
pub use actix_web;
pub use anyhow;
#[cfg(feature = "oauth")]
pub use oauth2;
pub use serde;
pub use serde_json;
pub use tera;

/// Session key holding the serialized logged-in user.
pub const SESSION_USER: &str = "user";

/// Session key for the in-flight oauth login state. Single use: read and
/// cleared by the callback before anything else happens.
#[cfg(feature = "oauth")]
pub const SESSION_OAUTH_FLOW: &str = "oauth_flow";

/// Session key for an identity awaiting signup confirmation.
#[cfg(feature = "oauth")]
pub const SESSION_PENDING_IDENTITY: &str = "oauth_pending_identity";

pub type Result<T> = std::result::Result<T, Error>;
