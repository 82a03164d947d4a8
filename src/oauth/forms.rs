use serde::{Deserialize, Serialize};
use trellis::forms::{BoolField, EmailField, TextField, Validation};
use trellis::oauth;

fn default_provider() -> String {
    oauth::DEFAULT_PROVIDER.to_string()
}

/// Starts a provider login. `is_connect` marks the flow as connecting the
/// provider to an existing account rather than signing in; `pk` is an
/// opaque value echoed through the provider round-trip.
#[derive(Default, Debug, Deserialize, Serialize)]
pub struct OAuthLoginForm {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub is_connect: BoolField,
    #[serde(default)]
    pub pk: Option<String>,
}

/// Shown when a new account needs explicit confirmation before creation.
/// The authoritative identity stays in the session; these fields exist for
/// display and a final email sanity check.
#[derive(Default, Debug, Deserialize, Serialize)]
pub struct ConfirmIdentityForm {
    pub name: TextField,
    pub email: EmailField,
}

impl ConfirmIdentityForm {
    pub fn is_valid(&mut self) -> bool {
        let name_ok = self.name.is_valid();
        self.email.is_valid() && name_ok
    }
}
