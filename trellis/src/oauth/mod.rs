//! OAuth2 authorization-code flow for social login.
//!
//! The pieces are laid out in the order a callback runs them: the stored
//! flow state is verified against the redirect (`verify_state`), the code is
//! traded for an access token (`request_token`), profile and email are
//! fetched and folded into a [`SocialIdentity`] (`fetch_user_info`), which
//! the application then hands to its registered [`AuthResponder`]s.

use std::collections::HashMap;

use constant_time_eq::constant_time_eq;
use oauth2::url::{form_urlencoded, Url};
use oauth2::basic::BasicClient;
use oauth2::{ClientId, ClientSecret};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OAuthError;
use crate::http;

pub mod client;
pub mod responder;

pub use client::{client_for, OAuthConfig, ProviderConfig, DEFAULT_PROVIDER};
pub use responder::{AuthDecision, AuthResponder, Responders};

/// State stored in the session when a login is initiated and read back
/// (exactly once) by the callback. `args` is an opaque bag the application
/// can use to carry flags across the provider round-trip.
#[derive(Debug, Deserialize, Serialize)]
pub struct OAuthFlow {
    pub provider: String,
    pub authorization_code: String,
    pub csrf_token_secret: String,
    #[serde(default)]
    pub args: HashMap<String, String>,
}

impl OAuthFlow {
    pub fn set_authorization_code(mut self, code: &str) -> Self {
        self.authorization_code = code.to_owned();
        self
    }

    /// Whether this flow was started to connect the provider to an existing
    /// account rather than to log in. Absent means false.
    pub fn is_connect(&self) -> bool {
        self.args
            .get("is_connect")
            .map(|value| value == "true")
            .unwrap_or(false)
    }
}

/// A provider client plus everything needed to call its REST endpoints.
#[derive(Clone)]
pub struct ScopedClient {
    pub provider: String,
    pub inner: BasicClient,
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub token_uri: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub profile_uri: String,
    pub email_uri: String,
}

pub struct ClientFlow {
    pub client: ScopedClient,
    pub flow: OAuthFlow,
}

/// The result of a successful token exchange, carrying forward what the
/// profile fetches need.
pub struct TokenInfo {
    pub provider: String,
    pub access_token: String,
    pub expires_in: u64,
    pub profile_uri: String,
    pub email_uri: String,
    pub is_connect: bool,
}

/// Normalized identity handed to the application's auth responders.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SocialIdentity {
    pub provider: String,
    pub uid: String,
    pub access_token: String,
    pub expires_in: u64,
    pub title: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub headline: Option<String>,
    pub email: String,
    pub is_connect: bool,
}

/// Compares the state echoed by the provider against the stored expectation.
/// The caller must have already removed the stored flow from the session;
/// by the time this runs the state is single-use.
pub fn verify_state(flow: &OAuthFlow, received: Option<&str>) -> Result<(), OAuthError> {
    let received = received.unwrap_or_default();
    if constant_time_eq(received.as_bytes(), flow.csrf_token_secret.as_bytes()) {
        Ok(())
    } else {
        warn!(
            "oauth state mismatch: expected {} received {}",
            flow.csrf_token_secret, received
        );
        Err(OAuthError::StateMismatch {
            expected: flow.csrf_token_secret.clone(),
            received: received.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Trades the authorization code for an access token. Codes are single-use
/// and expire within minutes, so a failed exchange is never retried.
pub fn request_token(client_flow: ClientFlow) -> Result<TokenInfo, OAuthError> {
    let ClientFlow { client, flow } = client_flow;
    let is_connect = flow.is_connect();
    let code = flow.authorization_code;

    let body = form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "authorization_code")
        .append_pair("code", &code)
        .append_pair("redirect_uri", &client.redirect_uri)
        .append_pair("client_id", client.client_id.as_str())
        .append_pair("client_secret", client.client_secret.secret())
        .finish();

    let response = http::post_form(&client.token_uri, body).map_err(|e| {
        error!("token exchange failed for code {}: {}", code, e);
        OAuthError::GrantTokenError {
            code: code.clone(),
            detail: e.to_string(),
        }
    })?;

    if !response.is_success() {
        error!(
            "token endpoint returned {} for code {}: {}",
            response.status,
            code,
            response.text()
        );
        return Err(OAuthError::GrantTokenError {
            detail: format!("HTTP {}: {}", response.status, response.text()),
            code,
        });
    }

    let token: AccessTokenResponse = serde_json::from_slice(&response.body).map_err(|e| {
        error!(
            "token endpoint body undecodable for code {}: {} (body: {})",
            code,
            e,
            response.text()
        );
        OAuthError::GrantTokenError {
            detail: e.to_string(),
            code: code.clone(),
        }
    })?;

    Ok(TokenInfo {
        provider: client.provider,
        access_token: token.access_token,
        expires_in: token.expires_in,
        profile_uri: client.profile_uri,
        email_uri: client.email_uri,
        is_connect,
    })
}

/// Fetches profile and email and folds them into a [`SocialIdentity`].
/// Both fetches must succeed; a partial identity is never produced.
pub fn fetch_user_info(token_info: TokenInfo) -> Result<SocialIdentity, OAuthError> {
    let profile = fetch_profile(&token_info)?;
    let email = fetch_email(&token_info)?;
    build_identity(&token_info, &profile, email)
}

/// The provider takes the bearer token as a query parameter.
fn authorized_uri(endpoint: &str, access_token: &str) -> Result<Url, OAuthError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| OAuthError::FetchUserDataError(format!("bad endpoint {}: {}", endpoint, e)))?;
    url.query_pairs_mut()
        .append_pair("oauth2_access_token", access_token);
    Ok(url)
}

fn fetch_profile(token_info: &TokenInfo) -> Result<Value, OAuthError> {
    let url = authorized_uri(&token_info.profile_uri, &token_info.access_token)?;
    let response = http::get(url.as_str()).map_err(|e| {
        error!("profile fetch failed: {}", e);
        OAuthError::FetchUserDataError(e.to_string())
    })?;

    match response.status {
        200 => response.json().map_err(|e| {
            error!("profile body undecodable: {}", e);
            OAuthError::FetchUserDataError(e.to_string())
        }),
        401 => {
            // Token rejected; a second request with the same token can only
            // fail the same way.
            warn!("profile fetch returned 401, will not retry");
            Err(OAuthError::FetchUserDataError("HTTP 401".to_string()))
        }
        status => {
            error!("profile fetch returned {}: {}", status, response.text());
            Err(OAuthError::FetchUserDataError(format!("HTTP {}", status)))
        }
    }
}

fn fetch_email(token_info: &TokenInfo) -> Result<String, OAuthError> {
    let url = authorized_uri(&token_info.email_uri, &token_info.access_token)?;
    let response = http::get(url.as_str()).map_err(|e| {
        error!("email fetch failed: {}", e);
        OAuthError::FetchUserDataError(e.to_string())
    })?;

    match response.status {
        200 => {
            let payload = response.json().map_err(|e| {
                error!("email body undecodable: {}", e);
                OAuthError::FetchUserDataError(e.to_string())
            })?;
            extract_email(&payload).ok_or_else(|| {
                warn!("email payload carried no address: {}", payload);
                OAuthError::NoEmail
            })
        }
        401 => {
            warn!("email fetch returned 401, will not retry");
            Err(OAuthError::FetchUserDataError("HTTP 401".to_string()))
        }
        status => {
            error!("email fetch returned {}: {}", status, response.text());
            Err(OAuthError::FetchUserDataError(format!("HTTP {}", status)))
        }
    }
}

/// Pulls the first address out of the provider's
/// `{"elements": [{"handle~": {"emailAddress": ...}}]}` envelope. Any
/// missing or mismatched level yields `None` rather than a panic.
fn extract_email(payload: &Value) -> Option<String> {
    payload
        .get("elements")?
        .as_array()?
        .first()?
        .get("handle~")?
        .get("emailAddress")?
        .as_str()
        .map(str::to_owned)
}

/// Resolves a profile field that is either a plain string, a localized map
/// (`{"localized": {"en_US": ...}}`), or null/absent. Prefers `en_US`,
/// falling back to the lowest-keyed locale so users without a US locale
/// still get a name.
fn localized_value(field: Option<&Value>) -> Option<String> {
    match field? {
        Value::String(plain) => Some(plain.clone()),
        Value::Object(map) => {
            let localized = map.get("localized")?.as_object()?;
            localized
                .get("en_US")
                .or_else(|| localized.values().next())?
                .as_str()
                .map(str::to_owned)
        }
        _ => None,
    }
}

fn build_identity(
    token_info: &TokenInfo,
    profile: &Value,
    email: String,
) -> Result<SocialIdentity, OAuthError> {
    let uid = profile.get("id").and_then(Value::as_str).ok_or_else(|| {
        error!("profile payload carried no member id: {}", profile);
        OAuthError::MissingUserId
    })?;

    let first_name = localized_value(profile.get("firstName"));
    let last_name = localized_value(profile.get("lastName"));
    let headline = localized_value(profile.get("headline"));

    let mut parts = Vec::new();
    if let Some(first) = &first_name {
        parts.push(first.as_str());
    }
    if let Some(last) = &last_name {
        parts.push(last.as_str());
    }
    let title = parts.join(" ");

    Ok(SocialIdentity {
        provider: token_info.provider.clone(),
        uid: uid.to_string(),
        access_token: token_info.access_token.clone(),
        expires_in: token_info.expires_in,
        title,
        first_name,
        last_name,
        headline,
        email,
        is_connect: token_info.is_connect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_client(server: &MockServer) -> ScopedClient {
        let config = OAuthConfig {
            callback_url: "http://localhost:8000/oauth/callback/".to_string(),
            providers: vec![ProviderConfig {
                name: "linkedin".to_string(),
                client_id: "app-id".to_string(),
                client_secret: "app-secret".to_string(),
                auth_uri: server.url("/oauth/v2/authorization"),
                token_uri: server.url("/oauth/v2/accessToken"),
                profile_uri: server.url("/v2/me"),
                email_uri: server.url("/v2/emailAddress?q=members&projection=(elements*(handle~))"),
                scopes: vec!["r_liteprofile".to_string(), "r_emailaddress".to_string()],
            }],
        };
        client_for(&config, "linkedin", None).unwrap()
    }

    fn flow(code: &str) -> OAuthFlow {
        OAuthFlow {
            provider: "linkedin".to_string(),
            authorization_code: String::new(),
            csrf_token_secret: "expected-state".to_string(),
            args: HashMap::new(),
        }
        .set_authorization_code(code)
    }

    fn token_info(server: &MockServer) -> TokenInfo {
        TokenInfo {
            provider: "linkedin".to_string(),
            access_token: "T".to_string(),
            expires_in: 3600,
            profile_uri: server.url("/v2/me"),
            email_uri: server.url("/v2/emailAddress?q=members&projection=(elements*(handle~))"),
            is_connect: false,
        }
    }

    fn profile_mock<'a>(server: &'a MockServer, body: &serde_json::Value) -> httpmock::Mock<'a> {
        let body = body.clone();
        server.mock(move |when, then| {
            when.method(GET)
                .path("/v2/me")
                .query_param("oauth2_access_token", "T");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(body.clone());
        })
    }

    fn email_mock<'a>(server: &'a MockServer, body: &serde_json::Value) -> httpmock::Mock<'a> {
        let body = body.clone();
        server.mock(move |when, then| {
            when.method(GET)
                .path("/v2/emailAddress")
                .query_param("q", "members")
                .query_param("oauth2_access_token", "T");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(body.clone());
        })
    }

    #[test]
    fn verify_state_accepts_the_stored_token() {
        assert!(verify_state(&flow(""), Some("expected-state")).is_ok());
    }

    #[test]
    fn verify_state_rejects_a_forged_token() {
        let result = verify_state(&flow(""), Some("forged"));
        assert!(matches!(result, Err(OAuthError::StateMismatch { .. })));
    }

    #[test]
    fn verify_state_rejects_an_absent_token() {
        let result = verify_state(&flow(""), None);
        assert!(matches!(result, Err(OAuthError::StateMismatch { .. })));
    }

    #[test]
    fn localized_value_takes_plain_strings() {
        assert_eq!(
            localized_value(Some(&json!("Principal Engineer"))),
            Some("Principal Engineer".to_string())
        );
    }

    #[test]
    fn localized_value_prefers_en_us() {
        let field = json!({"localized": {"en_US": "Jane", "fr_FR": "Jeanne"}});
        assert_eq!(localized_value(Some(&field)), Some("Jane".to_string()));
    }

    #[test]
    fn localized_value_falls_back_to_another_locale() {
        let field = json!({"localized": {"fr_FR": "Doe"}});
        assert_eq!(localized_value(Some(&field)), Some("Doe".to_string()));
    }

    #[test]
    fn localized_value_is_undefined_for_null_and_absent() {
        assert_eq!(localized_value(Some(&Value::Null)), None);
        assert_eq!(localized_value(None), None);
    }

    #[test]
    fn extract_email_reads_the_first_element() {
        let payload = json!({
            "elements": [{"handle~": {"emailAddress": "piet@example.com"}}]
        });
        assert_eq!(
            extract_email(&payload),
            Some("piet@example.com".to_string())
        );
    }

    #[test]
    fn extract_email_handles_every_broken_shape() {
        assert_eq!(extract_email(&json!({})), None);
        assert_eq!(extract_email(&json!({"elements": []})), None);
        assert_eq!(extract_email(&json!({"elements": [{}]})), None);
        assert_eq!(extract_email(&json!({"elements": [{"handle~": {}}]})), None);
        assert_eq!(extract_email(&json!({"elements": "nope"})), None);
    }

    #[test_log::test]
    fn request_token_returns_the_exchanged_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/oauth/v2/accessToken")
                .body_contains("grant_type=authorization_code")
                .body_contains("code=AUTHCODE")
                .body_contains("client_id=app-id");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"access_token": "T", "expires_in": 3600}));
        });

        let token_info = request_token(ClientFlow {
            client: test_client(&server),
            flow: flow("AUTHCODE"),
        })
        .unwrap();

        mock.assert();
        assert_eq!(token_info.access_token, "T");
        assert_eq!(token_info.expires_in, 3600);
    }

    #[test]
    fn request_token_fails_on_a_provider_rejection() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/oauth/v2/accessToken");
            then.status(400).body(r#"{"error":"invalid_grant"}"#);
        });

        let result = request_token(ClientFlow {
            client: test_client(&server),
            flow: flow("STALE"),
        });
        match result {
            Err(OAuthError::GrantTokenError { code, detail }) => {
                assert_eq!(code, "STALE");
                assert!(detail.contains("invalid_grant"));
            }
            other => panic!("expected GrantTokenError, got {:?}", other.map(|t| t.access_token)),
        }
    }

    #[test]
    fn request_token_fails_on_a_malformed_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/oauth/v2/accessToken");
            then.status(200).body("not json");
        });

        let result = request_token(ClientFlow {
            client: test_client(&server),
            flow: flow("AUTHCODE"),
        });
        assert!(matches!(result, Err(OAuthError::GrantTokenError { .. })));
    }

    #[test_log::test]
    fn fetch_user_info_builds_a_full_identity() {
        let server = MockServer::start();
        let profile = profile_mock(
            &server,
            &json!({
                "id": "U1",
                "firstName": {"localized": {"en_US": "Jane"}},
                "lastName": {"localized": {"fr_FR": "Doe"}},
                "headline": {"localized": {"en_US": "Principal Engineer"}}
            }),
        );
        let email = email_mock(
            &server,
            &json!({"elements": [{"handle~": {"emailAddress": "piet@example.com"}}]}),
        );

        let identity = fetch_user_info(token_info(&server)).unwrap();

        profile.assert();
        email.assert();
        assert_eq!(identity.uid, "U1");
        assert_eq!(identity.first_name.as_deref(), Some("Jane"));
        assert_eq!(identity.last_name.as_deref(), Some("Doe"));
        assert_eq!(identity.title, "Jane Doe");
        assert_eq!(identity.headline.as_deref(), Some("Principal Engineer"));
        assert_eq!(identity.email, "piet@example.com");
        assert_eq!(identity.access_token, "T");
        assert_eq!(identity.expires_in, 3600);
    }

    #[test]
    fn a_rejected_token_is_terminal_after_one_call() {
        let server = MockServer::start();
        let profile = server.mock(|when, then| {
            when.method(GET).path("/v2/me");
            then.status(401).body(r#"{"message":"Invalid access token"}"#);
        });
        let email = server.mock(|when, then| {
            when.method(GET).path("/v2/emailAddress");
            then.status(200).json_body(json!({"elements": []}));
        });

        let result = fetch_user_info(token_info(&server));

        assert!(matches!(result, Err(OAuthError::FetchUserDataError(_))));
        profile.assert_hits(1);
        email.assert_hits(0);
    }

    #[test]
    fn an_empty_email_envelope_fails_the_whole_fetch() {
        let server = MockServer::start();
        profile_mock(&server, &json!({"id": "U1"}));
        email_mock(&server, &json!({"elements": []}));

        let result = fetch_user_info(token_info(&server));
        assert!(matches!(result, Err(OAuthError::NoEmail)));
    }

    #[test]
    fn a_profile_without_an_id_is_rejected() {
        let server = MockServer::start();
        profile_mock(
            &server,
            &json!({"firstName": {"localized": {"en_US": "Jane"}}}),
        );
        email_mock(
            &server,
            &json!({"elements": [{"handle~": {"emailAddress": "piet@example.com"}}]}),
        );

        let result = fetch_user_info(token_info(&server));
        assert!(matches!(result, Err(OAuthError::MissingUserId)));
    }

    #[test]
    fn a_nameless_profile_still_normalizes() {
        let info = TokenInfo {
            provider: "linkedin".to_string(),
            access_token: "T".to_string(),
            expires_in: 60,
            profile_uri: String::new(),
            email_uri: String::new(),
            is_connect: true,
        };
        let identity =
            build_identity(&info, &json!({"id": "U9"}), "u9@example.com".to_string()).unwrap();
        assert_eq!(identity.title, "");
        assert_eq!(identity.first_name, None);
        assert!(identity.is_connect);
    }
}
