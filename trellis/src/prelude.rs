pub use actix_web::{HttpRequest, HttpResponse};
pub use tera::Context;

pub use crate::request::{Authentication, Render};
