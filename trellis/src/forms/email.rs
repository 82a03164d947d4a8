use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::Deref;
use validator::validate_email;

use super::Validation;

/// An email input validated for syntax, not deliverability.
#[derive(Debug, Default, Serialize)]
pub struct EmailField {
    pub value: String,
    pub errors: Vec<String>,
}

impl EmailField {
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

impl fmt::Display for EmailField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<'de> Deserialize<'de> for EmailField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer).map(|value: String| EmailField::new(value))
    }
}

impl Deref for EmailField {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl Validation for EmailField {
    fn is_valid(&mut self) -> bool {
        if self.value.is_empty() {
            self.errors
                .push("Email address cannot be blank.".to_string());
            return false;
        }

        if !validate_email(&self.value) {
            self.errors.push("Invalid email format.".to_string());
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_malformed_addresses_are_rejected() {
        let mut blank = EmailField::new("");
        assert!(!blank.is_valid());

        let mut malformed = EmailField::new("piet@");
        assert!(!malformed.is_valid());

        let mut fine = EmailField::new("piet@example.com");
        assert!(fine.is_valid());
        assert!(fine.errors.is_empty());
    }
}
