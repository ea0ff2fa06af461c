use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_EMAIL_LEN: usize = 254;

/// Normalized email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Parse a trimmed email and lowercase its domain part.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyEmail);
        }

        let len = trimmed.chars().count();
        if len > MAX_EMAIL_LEN {
            return Err(ValidationError::EmailTooLong {
                len,
                max: MAX_EMAIL_LEN,
            });
        }

        let invalid = || ValidationError::InvalidEmail {
            value: trimmed.to_owned(),
        };

        let (local, domain) = trimmed.split_once('@').ok_or_else(invalid)?;
        if local.is_empty() || domain.contains('@') || trimmed.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        let labels_ok = domain
            .split('.')
            .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'));
        if !domain.contains('.') || !labels_ok {
            return Err(invalid());
        }

        Ok(Self(format!("{local}@{}", domain.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Email {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Email {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_domain() {
        let email = Email::parse("  Jane.Doe@Example.COM ").expect("email should parse");
        assert_eq!(email.as_str(), "Jane.Doe@example.com");
    }

    #[test]
    fn rejects_missing_at() {
        let err = Email::parse("jane.example.com").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidEmail { .. }));
    }

    #[test]
    fn rejects_domain_without_dot() {
        let err = Email::parse("jane@localhost").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidEmail { .. }));
    }

    #[test]
    fn rejects_blank_input() {
        assert_eq!(Email::parse("   "), Err(ValidationError::EmptyEmail));
    }
}
