//! The session-side view of an account. Applications keep their own richer
//! account records; this is only what a request needs to know.

use serde::{Deserialize, Serialize};

/// The logged-in (or anonymous) user bound to a request session.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub is_admin: bool,
    pub is_anonymous: bool,
}

impl User {
    pub fn anonymous() -> Self {
        User {
            id: 0,
            name: String::new(),
            is_admin: false,
            is_anonymous: true,
        }
    }
}

impl Default for User {
    fn default() -> Self {
        User::anonymous()
    }
}
