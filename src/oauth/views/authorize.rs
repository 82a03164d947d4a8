use std::result;

use serde::{Deserialize, Serialize};
use trellis::actix_session::{Session, SessionExt};
use trellis::actix_web::web;
use trellis::error::OAuthError;
use trellis::forms::{EmailField, TextField};
use trellis::oauth::{self, AuthDecision, ClientFlow, OAuthConfig, OAuthFlow, SocialIdentity};
use trellis::prelude::*;
use trellis::request::{cookies_suppressed, SocialAuth};
use trellis::{Result, SESSION_OAUTH_FLOW, SESSION_PENDING_IDENTITY};

use crate::oauth::forms::ConfirmIdentityForm;

/// Query half of the redirect back from the provider. `code` is absent when
/// the user denied consent; `pk` is the opaque passthrough from initiation.
#[derive(Debug, Deserialize, Serialize)]
pub struct AuthRequest {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub pk: Option<String>,
}

/// Handles the callback from the provider: verify the stored state, trade
/// the code for a token, fetch the profile, and hand the normalized
/// identity to the registered responders. Every outcome renders a page;
/// nothing here bubbles a provider failure to the default error handler.
pub async fn exchange_code_for_token(
    request: HttpRequest,
    query: web::Query<AuthRequest>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let session = request.get_session();
    let config = request.oauth_config()?;

    let identity = validate_inputs(config, &session, &query)
        .and_then(oauth::request_token)
        .and_then(oauth::fetch_user_info);

    match identity {
        Ok(identity) => finalize_authentication(&request, &session, identity).await,
        Err(error) => render_outcome(&request, &error),
    }
}

/// POST-handler for confirming a pending signup. The pending identity is
/// read from the session (single use) and submitted to the responders'
/// confirm hook, unchanged from what the provider returned.
pub async fn confirm_identity(
    request: HttpRequest,
    form: web::Form<ConfirmIdentityForm>,
) -> Result<HttpResponse> {
    let session = request.get_session();
    let mut form = form.into_inner();

    let pending = session.get::<SocialIdentity>(SESSION_PENDING_IDENTITY);
    let identity = match pending {
        Ok(Some(identity)) => identity,
        _ => {
            warn!("signup confirmation without a pending identity");
            return render_outcome(&request, &OAuthError::MissingState);
        }
    };

    if !form.is_valid() {
        return request.render(400, "oauth/confirm.html", {
            let mut context = Context::new();
            context.insert("error", "Invalid email.");
            context.insert("service", &identity.provider);
            context.insert("form", &form);
            context
        });
    }

    session.remove(SESSION_PENDING_IDENTITY);

    let responders = request.auth_responders()?;
    match responders.dispatch_confirm(&identity).await {
        AuthDecision::Authenticated(user) => {
            info!(
                "confirmed signup for {} identity {}",
                identity.provider, identity.uid
            );
            request.set_user(user)?;
            render_success(&request, &identity)
        }
        AuthDecision::Duplicate => render_outcome(&request, &OAuthError::Duplicate),
        AuthDecision::DuplicateEmail(email) => {
            render_outcome(&request, &OAuthError::DuplicateEmail(email))
        }
        AuthDecision::Error(reason) => {
            error!(
                "signup confirmation failed for identity {:?}: {}",
                identity, reason
            );
            render_outcome(&request, &OAuthError::AuthUserError(reason))
        }
        AuthDecision::SignupConfirm | AuthDecision::Unhandled => {
            render_outcome(&request, &OAuthError::AuthUserUndefined)
        }
    }
}

/// Validates the redirect before any outbound call is made. The stored flow
/// is removed from the session first: a redirect is processed at most once,
/// whatever happens next.
fn validate_inputs(
    config: &OAuthConfig,
    session: &Session,
    query: &AuthRequest,
) -> result::Result<ClientFlow, OAuthError> {
    let stored = session.get::<OAuthFlow>(SESSION_OAUTH_FLOW);
    session.remove(SESSION_OAUTH_FLOW);
    session.remove(SESSION_PENDING_IDENTITY);

    let flow = match stored {
        Ok(Some(flow)) => flow,
        _ => {
            warn!("oauth callback without a stored flow");
            return Err(OAuthError::MissingState);
        }
    };

    oauth::verify_state(&flow, query.state.as_deref())?;

    match query.code.as_deref() {
        Some(code) if !code.is_empty() => {
            match oauth::client_for(config, &flow.provider, query.pk.as_deref()) {
                Some(client) => Ok(ClientFlow {
                    client,
                    flow: flow.set_authorization_code(code),
                }),
                _ => Err(OAuthError::UnknownProvider(flow.provider)),
            }
        }
        _ => {
            info!(
                "authorization canceled at the provider (error={:?})",
                query.error
            );
            Err(OAuthError::Canceled)
        }
    }
}

async fn finalize_authentication(
    request: &HttpRequest,
    session: &Session,
    identity: SocialIdentity,
) -> Result<HttpResponse> {
    let responders = request.auth_responders()?;
    match responders.dispatch(&identity).await {
        AuthDecision::Authenticated(user) => {
            info!(
                "oauth login via {} for identity {}",
                identity.provider, identity.uid
            );
            request.set_user(user)?;
            render_success(request, &identity)
        }
        AuthDecision::SignupConfirm => {
            session.insert(SESSION_PENDING_IDENTITY, &identity)?;
            render_confirmation(request, &identity)
        }
        AuthDecision::Duplicate => render_outcome(request, &OAuthError::Duplicate),
        AuthDecision::DuplicateEmail(email) => {
            render_outcome(request, &OAuthError::DuplicateEmail(email))
        }
        AuthDecision::Error(reason) => {
            error!("auth responder failed for identity {:?}: {}", identity, reason);
            render_outcome(request, &OAuthError::AuthUserError(reason))
        }
        AuthDecision::Unhandled => render_outcome(request, &OAuthError::AuthUserUndefined),
    }
}

fn render_success(request: &HttpRequest, identity: &SocialIdentity) -> Result<HttpResponse> {
    request.render(200, "oauth/success.html", {
        let mut ctx = Context::new();
        ctx.insert("service", &identity.provider);
        ctx.insert("name", &identity.title);
        ctx
    })
}

fn render_confirmation(request: &HttpRequest, identity: &SocialIdentity) -> Result<HttpResponse> {
    let form = ConfirmIdentityForm {
        name: TextField::new(identity.title.clone()),
        email: EmailField::new(identity.email.clone()),
    };

    request.render(200, "oauth/confirm.html", {
        let mut ctx = Context::new();
        ctx.insert("service", &identity.provider);
        ctx.insert("form", &form);
        ctx
    })
}

/// Renders the terminal page for a canceled or failed flow. Cancellation is
/// the user's own decision, so it gets a 200; everything else is a 400.
fn render_outcome(request: &HttpRequest, error: &OAuthError) -> Result<HttpResponse> {
    let error_code = error.error_code();
    let status = if matches!(error, OAuthError::Canceled) {
        200
    } else {
        warn!("oauth flow ended with {}: {}", error_code, error);
        400
    };

    request.render(status, "oauth/error.html", {
        let mut ctx = Context::new();
        ctx.insert("service", oauth::DEFAULT_PROVIDER);
        ctx.insert("error_code", error_code);
        if let OAuthError::DuplicateEmail(email) = error {
            ctx.insert("email", email);
        }
        ctx.insert("cookies_suppressed", &cookies_suppressed(request));
        ctx
    })
}
