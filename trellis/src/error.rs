//! Error types for trellis applications.

use actix_session::{SessionGetError, SessionInsertError};
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error as ThisError;

/// Framework-level error. Handlers return `trellis::Result<HttpResponse>`;
/// anything that escapes a handler is rendered by `error_response` below.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("{0}")]
    Generic(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session error: {0}")]
    Session(String),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[cfg(feature = "oauth")]
    #[error(transparent)]
    OAuth(#[from] OAuthError),
}

impl From<SessionGetError> for Error {
    fn from(e: SessionGetError) -> Self {
        Error::Session(e.to_string())
    }
}

impl From<SessionInsertError> for Error {
    fn from(e: SessionInsertError) -> Self {
        Error::Session(e.to_string())
    }
}

impl ResponseError for Error {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::InternalServerError()
            .content_type("text/html; charset=utf-8")
            .body(render(self))
    }
}

/// Renders a minimal standalone error page. Used when an error escapes a
/// handler, including when the template store itself is unavailable; shows
/// nothing about the failure to the end user.
pub fn render(error: &Error) -> String {
    error!("{}", error);

    r#"<!doctype html>
<html>
<head><title>Something went wrong</title></head>
<body>
<h1>Something went wrong</h1>
<p>We hit an internal error while handling your request. Try again in a moment.</p>
</body>
</html>"#
        .to_string()
}

/// Everything that can end an oauth login, in the order the flow can fail.
/// Not every variant is an operator-level error: `Canceled` is a normal
/// user decision and renders with a 200.
#[cfg(feature = "oauth")]
#[derive(Debug, ThisError)]
pub enum OAuthError {
    #[error("authorization was canceled at the provider")]
    Canceled,

    #[error("no oauth login in progress")]
    MissingState,

    #[error("state token mismatch (expected {expected}, received {received})")]
    StateMismatch { expected: String, received: String },

    #[error("provider {0} is not configured")]
    UnknownProvider(String),

    #[error("token exchange failed for code {code}: {detail}")]
    GrantTokenError { code: String, detail: String },

    #[error("user data fetch failed: {0}")]
    FetchUserDataError(String),

    #[error("provider profile has no member id")]
    MissingUserId,

    #[error("provider account exposes no email address")]
    NoEmail,

    #[error("no responder accepted the identity")]
    AuthUserUndefined,

    #[error("identity is already linked to another account")]
    Duplicate,

    #[error("email {0} already belongs to another account")]
    DuplicateEmail(String),

    #[error("authentication handler error: {0}")]
    AuthUserError(String),
}

#[cfg(feature = "oauth")]
impl OAuthError {
    /// Stable identifier the error template branches on. Fetch, decode,
    /// missing-id and missing-email failures all collapse into `user_data`:
    /// the user can't act on the distinction, the logs carry it.
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuthError::Canceled => "cancel",
            OAuthError::MissingState => "missing_state",
            OAuthError::StateMismatch { .. } => "state_mismatch",
            OAuthError::UnknownProvider(_) => "unknown_provider",
            OAuthError::GrantTokenError { .. } => "access_token",
            OAuthError::FetchUserDataError(_) | OAuthError::MissingUserId | OAuthError::NoEmail => {
                "user_data"
            }
            OAuthError::AuthUserUndefined => "auth_undefined",
            OAuthError::Duplicate => "duplicate",
            OAuthError::DuplicateEmail(_) => "duplicate_email",
            OAuthError::AuthUserError(_) => "auth_failed",
        }
    }
}
