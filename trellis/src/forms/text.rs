use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::Deref;

use super::Validation;

/// A free-text input that must not be blank. Plain `String` works too if
/// you don't need the `errors` convention for re-rendering forms.
#[derive(Debug, Default, Serialize)]
pub struct TextField {
    pub value: String,
    pub errors: Vec<String>,
}

impl TextField {
    pub fn new<S>(value: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            value: value.into(),
            errors: Vec::new(),
        }
    }
}

impl From<String> for TextField {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<'de> Deserialize<'de> for TextField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer).map(|value: String| TextField::new(value))
    }
}

impl Deref for TextField {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl Validation for TextField {
    fn is_valid(&mut self) -> bool {
        if self.value.is_empty() {
            self.errors.push("Value cannot be blank.".to_string());
            return false;
        }

        true
    }
}
