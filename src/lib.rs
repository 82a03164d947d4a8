//! A host application wired for social login: the provider callback flow
//! lives in `oauth`, the account policy it defers to lives in `accounts`.

use std::io;

#[macro_use]
extern crate log;

pub mod accounts;
pub mod oauth;
pub mod pages;

pub async fn main() -> io::Result<()> {
    let stdout = io::stdout();
    let _lock = stdout.lock();

    trellis::Server::new()
        .register_service(pages::configure)
        .register_service(oauth::configure)
        .register_responder(Box::new(accounts::AccountDirectory::new()))
        .run()
        .await?
        .await
}
