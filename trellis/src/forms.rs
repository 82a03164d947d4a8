//! Implements a set of input types that can be used for Form handling.
//! Mostly modeled after Django's Form class.
//!
//! Example:
//!
//! ```rust
//! use trellis::forms::{EmailField, TextField, Validation};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! pub struct MyForm {
//!     pub name: TextField,
//!     pub email: EmailField,
//! }
//!
//! impl MyForm {
//!     pub fn is_valid(&mut self) -> bool {
//!         let name_ok = self.name.is_valid();
//!         self.email.is_valid() && name_ok
//!     }
//! }
//! ```

/// Fields validate in place, pushing human-readable messages onto their
/// `errors` so a re-rendered form can show them next to the input.
pub trait Validation {
    fn is_valid(&mut self) -> bool;
}

mod booly;
pub use booly::BoolField;

mod email;
pub use email::EmailField;

mod text;
pub use text::TextField;
