use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    mainlib::main().await
}
