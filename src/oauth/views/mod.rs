pub mod authorize;
pub mod login;
