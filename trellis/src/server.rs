use std::env;
use std::sync::Arc;

use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::web::ServiceConfig;
use actix_web::{dev, middleware, web, App, HttpServer};

#[cfg(feature = "oauth")]
use crate::oauth::{AuthResponder, OAuthConfig, Responders};

/// This struct provides a slightly simpler way to write `main.rs` in
/// the root project, and forces more coupling to app-specific modules.
#[derive(Default)]
pub struct Server {
    apps: Vec<Box<dyn Fn(&mut ServiceConfig) + Send + Sync + 'static>>,
    #[cfg(feature = "oauth")]
    responders: Responders,
}

impl Server {
    /// Creates a new Server struct to configure.
    pub fn new() -> Self {
        Server::default()
    }

    /// Registers a service.
    pub fn register_service<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut ServiceConfig) + Send + Sync + 'static,
    {
        self.apps.push(Box::new(handler));
        self
    }

    /// Registers an auth responder. Responders are consulted in
    /// registration order when a social login completes.
    #[cfg(feature = "oauth")]
    pub fn register_responder(mut self, responder: Box<dyn AuthResponder>) -> Self {
        self.responders.push(responder);
        self
    }

    /// Consumes and then runs the server, with default settings that we
    /// generally want.
    pub async fn run(self) -> std::io::Result<dev::Server> {
        dotenv::dotenv().ok();
        pretty_env_logger::init();

        let bind = env::var("BIND_TO").expect("BIND_TO not set!");
        let secret_key = Key::from(env::var("SECRET_KEY").expect("SECRET_KEY not set!").as_bytes());

        #[cfg(feature = "production")]
        let cookie_domain = env::var("SESSIONID_DOMAIN").expect("SESSIONID_DOMAIN not set!");

        let template_store = crate::templates::load();
        let templates = template_store.templates.clone();

        #[cfg(feature = "oauth")]
        let oauth_config = web::Data::new(OAuthConfig::from_env());

        #[cfg(feature = "oauth")]
        let responders = web::Data::new(self.responders);

        let apps = Arc::new(self.apps);

        let server = HttpServer::new(move || {
            // !production needs no domain set, because browsers.
            #[cfg(not(feature = "production"))]
            let session_storage =
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_path("/".to_string())
                    .cookie_name("sessionid".to_string())
                    .cookie_secure(false);

            #[cfg(feature = "production")]
            let session_storage =
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_path("/".to_string())
                    .cookie_name("sessionid".to_string())
                    .cookie_secure(true)
                    .cookie_same_site(actix_web::cookie::SameSite::Lax)
                    .cookie_domain(Some(cookie_domain.clone()));

            let mut app = App::new()
                .app_data(templates.clone())
                .wrap(middleware::Logger::default())
                .wrap(session_storage.build());

            #[cfg(feature = "oauth")]
            {
                app = app
                    .app_data(oauth_config.clone())
                    .app_data(responders.clone());
            }

            // Configure app resources and routes
            for handler in apps.iter() {
                app = app.configure(handler);
            }

            app
        })
        .backlog(8192)
        .shutdown_timeout(0)
        .workers(4)
        .bind(&bind)?
        .run();

        Ok(server)
    }
}
