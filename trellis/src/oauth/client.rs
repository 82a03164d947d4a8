//! Provider configuration and client construction.
//!
//! Provider settings are loaded once at startup into an [`OAuthConfig`] and
//! passed around explicitly; nothing in the flow reads the environment.

use std::env;

use oauth2::basic::BasicClient;
use oauth2::url::Url;
use oauth2::{AuthType, AuthUrl, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope, TokenUrl};

use super::ScopedClient;

pub const DEFAULT_PROVIDER: &str = "linkedin";

const LINKEDIN_AUTH_URI: &str = "https://www.linkedin.com/oauth/v2/authorization";
const LINKEDIN_TOKEN_URI: &str = "https://www.linkedin.com/oauth/v2/accessToken";
const LINKEDIN_PROFILE_URI: &str = "https://api.linkedin.com/v2/me";
const LINKEDIN_EMAIL_URI: &str =
    "https://api.linkedin.com/v2/emailAddress?q=members&projection=(elements*(handle~))";

/// Application credentials and endpoints for one provider. Endpoints are
/// part of the config so tests can point them at a local mock server.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub profile_uri: String,
    pub email_uri: String,
    pub scopes: Vec<String>,
}

impl ProviderConfig {
    pub fn linkedin(client_id: String, client_secret: String) -> Self {
        ProviderConfig {
            name: DEFAULT_PROVIDER.to_string(),
            client_id,
            client_secret,
            auth_uri: LINKEDIN_AUTH_URI.to_string(),
            token_uri: LINKEDIN_TOKEN_URI.to_string(),
            profile_uri: LINKEDIN_PROFILE_URI.to_string(),
            email_uri: LINKEDIN_EMAIL_URI.to_string(),
            scopes: vec!["r_liteprofile".to_string(), "r_emailaddress".to_string()],
        }
    }
}

/// All oauth settings for the application.
#[derive(Clone, Debug)]
pub struct OAuthConfig {
    /// The callback URL registered with the provider, without the `pk`
    /// passthrough parameter.
    pub callback_url: String,
    pub providers: Vec<ProviderConfig>,
}

impl OAuthConfig {
    /// Reads the provider credentials from the environment. Called once in
    /// `Server::run`; missing configuration is a startup failure.
    pub fn from_env() -> Self {
        let callback_url =
            env::var("OAUTH_CALLBACK_URL").expect("OAUTH_CALLBACK_URL not set!");
        let client_id = env::var("LINKEDIN_CLIENT_ID").expect("LINKEDIN_CLIENT_ID not set!");
        let client_secret =
            env::var("LINKEDIN_CLIENT_SECRET").expect("LINKEDIN_CLIENT_SECRET not set!");

        OAuthConfig {
            callback_url,
            providers: vec![ProviderConfig::linkedin(client_id, client_secret)],
        }
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|provider| provider.name == name)
    }

    pub fn valid_provider(&self, name: &str) -> bool {
        self.provider(name).is_some()
    }

    /// Reconstructs the exact redirect URI registered for this flow. The
    /// opaque `pk` parameter is echoed through so the token exchange sends
    /// the same URI the authorization request carried.
    pub fn redirect_uri(&self, pk: Option<&str>) -> String {
        match pk {
            Some(pk) => {
                let mut url =
                    Url::parse(&self.callback_url).expect("Invalid callback URL");
                url.query_pairs_mut().append_pair("pk", pk);
                url.to_string()
            }
            None => self.callback_url.clone(),
        }
    }
}

/// Builds the scoped client for a configured provider, or `None` when the
/// provider name is unknown.
pub fn client_for(config: &OAuthConfig, name: &str, pk: Option<&str>) -> Option<ScopedClient> {
    let provider = config.provider(name)?;
    let redirect_uri = config.redirect_uri(pk);

    let client_id = ClientId::new(provider.client_id.clone());
    let client_secret = ClientSecret::new(provider.client_secret.clone());

    // The provider wants client credentials in the token request body, not
    // in an Authorization header.
    let inner = BasicClient::new(
        client_id.clone(),
        Some(client_secret.clone()),
        AuthUrl::new(provider.auth_uri.clone()).expect("Invalid authorization endpoint URL"),
        Some(TokenUrl::new(provider.token_uri.clone()).expect("Invalid token endpoint URL")),
    )
    .set_auth_type(AuthType::RequestBody)
    .set_redirect_uri(RedirectUrl::new(redirect_uri.clone()).expect("Invalid redirect URL"));

    Some(ScopedClient {
        provider: provider.name.clone(),
        inner,
        client_id,
        client_secret,
        token_uri: provider.token_uri.clone(),
        redirect_uri,
        scopes: provider.scopes.clone(),
        profile_uri: provider.profile_uri.clone(),
        email_uri: provider.email_uri.clone(),
    })
}

/// Generates the authorization URL to which we'll redirect the user, with a
/// fresh random state token the callback will verify.
pub fn authorization_request(client: &ScopedClient) -> (Url, CsrfToken) {
    let mut request = client.inner.authorize_url(CsrfToken::new_random);
    for scope in client.scopes.as_slice() {
        request = request.add_scope(Scope::new(scope.to_string()));
    }
    request.url()
}
