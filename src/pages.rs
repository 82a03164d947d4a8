use trellis::actix_web::web::{resource, ServiceConfig};
use trellis::prelude::*;
use trellis::Result;

pub async fn homepage(request: HttpRequest) -> Result<HttpResponse> {
    let user = request.user()?;
    request.render(200, "index.html", {
        let mut ctx = Context::new();
        ctx.insert("user", &user);
        ctx
    })
}

pub fn configure(config: &mut ServiceConfig) {
    config.service(resource("/").to(homepage));
}
