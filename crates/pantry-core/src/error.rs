use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StoreError;
use crate::view::TransitionError;

/// Client-side input rejected before any request is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("email cannot be empty")]
    EmptyEmail,
    #[error("email length {len} exceeds max {max}")]
    EmailTooLong { len: usize, max: usize },
    #[error("email must look like name@domain.tld: '{value}'")]
    InvalidEmail { value: String },

    #[error("name cannot be empty")]
    EmptyName,
    #[error("password cannot be empty")]
    EmptyPassword,
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    #[error("password confirmation does not match")]
    PasswordMismatch,

    #[error("verification code cannot be empty")]
    EmptyVerificationCode,
    #[error("verification code contains invalid character '{ch}'")]
    InvalidVerificationCode { ch: char },
    #[error("verification code exceeds {max} characters")]
    VerificationCodeTooLong { max: usize },

    #[error("job key cannot be empty")]
    EmptyJobKey,

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("base url must start with http:// or https://: '{value}'")]
    InvalidBaseUrl { value: String },
    #[error("configuration value for {key} is invalid: '{value}'")]
    InvalidConfig { key: &'static str, value: String },
}

/// Top-level error type for flows that combine requests, polling and storage.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("job failed: {message}")]
    JobFailed { message: String },

    #[error("job ended in an unknown state: {reason}")]
    JobUnknown { reason: String },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("not signed in")]
    NotSignedIn,
}

impl CoreError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Api(error) => error.code(),
            Self::Store(_) => "store",
            Self::JobFailed { .. } => "job.failed",
            Self::JobUnknown { .. } => "job.unknown",
            Self::Transition(_) => "view.transition",
            Self::NotSignedIn => "session.not_signed_in",
        }
    }

    /// Text for a form-level error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(error) => error.message().to_owned(),
            Self::NotSignedIn => String::from("Please sign in to continue"),
            Self::JobFailed { message } => message.clone(),
            other => other.to_string(),
        }
    }
}
