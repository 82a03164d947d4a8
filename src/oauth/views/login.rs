use std::collections::HashMap;

use trellis::actix_session::SessionExt;
use trellis::actix_web::web::Form;
use trellis::error::OAuthError;
use trellis::oauth::{self, OAuthFlow};
use trellis::prelude::*;
use trellis::request::SocialAuth;
use trellis::{Result, SESSION_OAUTH_FLOW};

use crate::oauth::forms::OAuthLoginForm;

/// The social login page. Showing it abandons any flow already in flight.
pub async fn form(request: HttpRequest) -> Result<HttpResponse> {
    request.get_session().remove(SESSION_OAUTH_FLOW);
    request.render(200, "oauth/login.html", {
        let mut ctx = Context::new();
        ctx.insert("form", &OAuthLoginForm::default());
        ctx
    })
}

/// POST-handler: stores the flow state and redirects to the provider.
pub async fn authenticate(request: HttpRequest, form: Form<OAuthLoginForm>) -> Result<HttpResponse> {
    let form = form.into_inner();
    request_authorization(request, form)
}

fn request_authorization(request: HttpRequest, form: OAuthLoginForm) -> Result<HttpResponse> {
    let config = request.oauth_config()?;
    match oauth::client_for(config, &form.provider, form.pk.as_deref()) {
        Some(client) => {
            let (authorize_url, csrf_token) = oauth::client::authorization_request(&client);

            let mut args = HashMap::new();
            if form.is_connect.value {
                args.insert("is_connect".to_string(), "true".to_string());
            }
            let flow = OAuthFlow {
                provider: form.provider.clone(),
                authorization_code: String::new(),
                csrf_token_secret: csrf_token.secret().into(),
                args,
            };

            request.get_session().insert(SESSION_OAUTH_FLOW, flow)?;
            request.redirect(authorize_url.as_str())
        }
        _ => Err(OAuthError::UnknownProvider(form.provider).into()),
    }
}
