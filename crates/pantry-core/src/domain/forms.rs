use serde_json::{json, Value};

use crate::domain::Email;
use crate::ValidationError;

pub const MIN_PASSWORD_LEN: usize = 8;
const MAX_CODE_LEN: usize = 12;

/// Signup form input, validated before `POST /users/register`.
#[derive(Clone, PartialEq, Eq)]
pub struct SignupForm {
    name: String,
    email: Email,
    password: String,
}

impl SignupForm {
    pub fn new(
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let email = Email::parse(email)?;

        if password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        if password != confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }

        Ok(Self {
            name: name.to_owned(),
            email,
            password: password.to_owned(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub(crate) fn to_body(&self) -> Value {
        json!({
            "name": self.name,
            "email": self.email.as_str(),
            "password": self.password,
        })
    }
}

impl std::fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Login form input, validated before `POST /users/login`.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginForm {
    email: Email,
    password: String,
}

impl LoginForm {
    pub fn new(email: &str, password: &str) -> Result<Self, ValidationError> {
        let email = Email::parse(email)?;
        if password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }

        Ok(Self {
            email,
            password: password.to_owned(),
        })
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub(crate) fn to_body(&self) -> Value {
        json!({
            "email": self.email.as_str(),
            "password": self.password,
        })
    }
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Code from the verification email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCode(String);

impl VerificationCode {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyVerificationCode);
        }

        if let Some(ch) = trimmed.chars().find(|ch| !ch.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidVerificationCode { ch });
        }

        if trimmed.len() > MAX_CODE_LEN {
            return Err(ValidationError::VerificationCodeTooLong { max: MAX_CODE_LEN });
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_requires_matching_confirmation() {
        let err = SignupForm::new("Jane", "jane@example.com", "hunter22!", "hunter23!")
            .expect_err("must fail");
        assert_eq!(err, ValidationError::PasswordMismatch);
    }

    #[test]
    fn signup_rejects_short_password() {
        let err =
            SignupForm::new("Jane", "jane@example.com", "short", "short").expect_err("must fail");
        assert_eq!(
            err,
            ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN
            }
        );
    }

    #[test]
    fn signup_body_carries_normalized_email() {
        let form = SignupForm::new(" Jane ", "jane@EXAMPLE.com", "hunter22!", "hunter22!")
            .expect("valid form");
        let body = form.to_body();
        assert_eq!(body["name"], "Jane");
        assert_eq!(body["email"], "jane@example.com");
    }

    #[test]
    fn form_debug_never_prints_password() {
        let form = LoginForm::new("jane@example.com", "hunter22!").expect("valid form");
        assert!(!format!("{form:?}").contains("hunter22!"));
    }

    #[test]
    fn verification_code_rejects_symbols() {
        let err = VerificationCode::parse("12-34").expect_err("must fail");
        assert_eq!(err, ValidationError::InvalidVerificationCode { ch: '-' });
    }
}
