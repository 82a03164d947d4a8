//! The host side of social login: account records and the responder that
//! decides what an arriving identity means for them.

pub mod models;

pub use models::{Account, AccountDirectory, Identity};
