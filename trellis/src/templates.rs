//! Tera template loading. Templates are compiled once at startup and shared
//! with every worker through the app data; `Render` on `HttpRequest` pulls
//! them back out.

use std::env;
use std::sync::{Arc, RwLock};

use tera::Tera;

#[derive(Clone)]
pub struct TemplateStore {
    pub templates: Arc<RwLock<Tera>>,
}

/// Compiles all templates under `TEMPLATE_DIR` (default `templates/`).
/// Bad template syntax is a startup failure, not a request-time one.
pub fn load() -> TemplateStore {
    let root = env::var("TEMPLATE_DIR").unwrap_or_else(|_| "templates".to_string());
    let glob = format!("{}/**/*.html", root.trim_end_matches('/'));
    let tera = Tera::new(&glob).expect("Unable to compile templates!");

    TemplateStore {
        templates: Arc::new(RwLock::new(tera)),
    }
}
