//! Traits implemented on `HttpRequest` so handlers can render templates,
//! check the session user, and reach application-level services without
//! threading them through every signature.

use std::sync::{Arc, RwLock};

use actix_session::SessionExt;
use actix_web::http::{header, StatusCode};
use actix_web::{HttpRequest, HttpResponse};
use fancy_regex::Regex;
use lazy_static::lazy_static;
use tera::{Context, Tera};

use crate::accounts::User;
use crate::error::Error;
use crate::{Result, SESSION_USER};

/// Template rendering and redirects.
pub trait Render {
    fn render(&self, status: u16, template: &str, context: Context) -> Result<HttpResponse>;
    fn redirect(&self, location: &str) -> Result<HttpResponse>;
}

impl Render for HttpRequest {
    fn render(&self, status: u16, template: &str, context: Context) -> Result<HttpResponse> {
        let templates: &Arc<RwLock<Tera>> = self
            .app_data()
            .ok_or_else(|| Error::Generic("Template store unavailable.".to_string()))?;
        let engine = templates
            .read()
            .map_err(|_| Error::Generic("Template store lock poisoned.".to_string()))?;
        let body = engine.render(template, &context)?;
        let status = StatusCode::from_u16(status)
            .map_err(|e| Error::Generic(format!("Invalid status code: {}", e)))?;

        Ok(HttpResponse::build(status)
            .content_type("text/html; charset=utf-8")
            .body(body))
    }

    fn redirect(&self, location: &str) -> Result<HttpResponse> {
        Ok(HttpResponse::Found()
            .append_header((header::LOCATION, location))
            .finish())
    }
}

/// Session-backed user state.
pub trait Authentication {
    fn is_authenticated(&self) -> Result<bool>;
    fn user(&self) -> Result<User>;
    fn set_user(&self, user: User) -> Result<()>;
}

impl Authentication for HttpRequest {
    fn is_authenticated(&self) -> Result<bool> {
        Ok(self
            .get_session()
            .get::<User>(SESSION_USER)?
            .map(|user| !user.is_anonymous)
            .unwrap_or(false))
    }

    fn user(&self) -> Result<User> {
        Ok(self
            .get_session()
            .get::<User>(SESSION_USER)?
            .unwrap_or_else(User::anonymous))
    }

    fn set_user(&self, user: User) -> Result<()> {
        Ok(self.get_session().insert(SESSION_USER, user)?)
    }
}

/// Grabs the oauth services registered on the server.
#[cfg(feature = "oauth")]
pub trait SocialAuth {
    fn oauth_config(&self) -> Result<&crate::oauth::OAuthConfig>;
    fn auth_responders(&self) -> Result<&crate::oauth::Responders>;
}

#[cfg(feature = "oauth")]
impl SocialAuth for HttpRequest {
    fn oauth_config(&self) -> Result<&crate::oauth::OAuthConfig> {
        let config: Option<&actix_web::web::Data<crate::oauth::OAuthConfig>> = self.app_data();
        config
            .map(|data| data.get_ref())
            .ok_or_else(|| Error::Generic("OAuthConfig unavailable.".to_string()))
    }

    fn auth_responders(&self) -> Result<&crate::oauth::Responders> {
        let responders: Option<&actix_web::web::Data<crate::oauth::Responders>> = self.app_data();
        responders
            .map(|data| data.get_ref())
            .ok_or_else(|| Error::Generic("Auth responders unavailable.".to_string()))
    }
}

lazy_static! {
    // IE drops the session cookie across a cross-site redirect unless the
    // response carries a P3P header; that is the browser this hint targets.
    static ref COOKIE_BLOCKING_UA: Regex = Regex::new(r"MSIE \d+\.\d+").unwrap();
}

/// True when the request carries no cookies at all and the user agent is one
/// known to drop cookies across the provider redirect. Templates use this to
/// show a browser-specific hint instead of a generic failure.
pub fn cookies_suppressed(request: &HttpRequest) -> bool {
    let has_cookies = request
        .cookies()
        .map(|cookies| !cookies.is_empty())
        .unwrap_or(false);
    if has_cookies {
        return false;
    }

    request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|ua| COOKIE_BLOCKING_UA.is_match(ua).unwrap_or(false))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::cookies_suppressed;
    use actix_web::http::header;
    use actix_web::test::TestRequest;

    const MSIE: &str = "Mozilla/4.0 (compatible; MSIE 7.0; Windows NT 5.1)";

    #[test]
    fn cookieless_msie_is_flagged() {
        let request = TestRequest::default()
            .insert_header((header::USER_AGENT, MSIE))
            .to_http_request();
        assert!(cookies_suppressed(&request));
    }

    #[test]
    fn other_agents_are_not_flagged() {
        let request = TestRequest::default()
            .insert_header((header::USER_AGENT, "Mozilla/5.0 (X11; Linux x86_64) Firefox/97.0"))
            .to_http_request();
        assert!(!cookies_suppressed(&request));
    }

    #[test]
    fn a_cookie_clears_the_flag() {
        let request = TestRequest::default()
            .insert_header((header::USER_AGENT, MSIE))
            .insert_header((header::COOKIE, "sessionid=abc"))
            .to_http_request();
        assert!(!cookies_suppressed(&request));
    }
}
