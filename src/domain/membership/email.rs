//! Supporter e-mail address.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern")
});

/// Normalised (trimmed, lower-cased) e-mail address.
///
/// Records are keyed on (integration, email), so normalisation keeps
/// `Ana@Example.com` and `ana@example.com ` on the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalised = raw.trim().to_lowercase();
        if normalised.is_empty() {
            return Err(ValidationError::empty_field("email"));
        }
        if !EMAIL_PATTERN.is_match(&normalised) {
            return Err(ValidationError::invalid_format("email", "not an e-mail address"));
        }
        Ok(Self(normalised))
    }

    /// Whether free text typed into a chat looks like an address.
    pub fn looks_like(text: &str) -> bool {
        EMAIL_PATTERN.is_match(text.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Email::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}
