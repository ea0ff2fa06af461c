use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::Email;
use crate::ValidationError;

/// Backend job families observed through polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Account preparation after email verification, tracked by email.
    EmailVerification,
    /// Account preparation after a login that reported pending, tracked by user id.
    AccountDataFetch,
    /// Dashboard aggregation for the signed-in user.
    DashboardAggregate,
}

impl JobKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmailVerification => "email_verification",
            Self::AccountDataFetch => "account_data_fetch",
            Self::DashboardAggregate => "dashboard_aggregate",
        }
    }
}

impl Display for JobKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one in-flight backend job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JobHandle {
    kind: JobKind,
    key: String,
}

impl JobHandle {
    /// Build a handle, validating the key before any poll can be armed.
    pub fn new(kind: JobKind, key: &str) -> Result<Self, ValidationError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ValidationError::EmptyJobKey);
        }

        let key = match kind {
            JobKind::EmailVerification => String::from(Email::parse(key)?),
            JobKind::AccountDataFetch | JobKind::DashboardAggregate => key.to_owned(),
        };

        Ok(Self { kind, key })
    }

    pub fn email_verification(email: &Email) -> Self {
        Self {
            kind: JobKind::EmailVerification,
            key: email.as_str().to_owned(),
        }
    }

    pub const fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Display for JobHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

/// Job state reported by one status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Completed,
    Failed,
    /// The response did not match the status contract.
    Unknown,
}

impl JobState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn from_wire(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

/// Parsed status response: `{ status, progress?, message? }`.
///
/// Every field except `status` is kept in `payload` untouched so the view can
/// render whatever the backend sends along.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    pub state: JobState,
    pub payload: Map<String, Value>,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            payload: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::new(JobState::Unknown);
        };

        let state = match fields.remove("status") {
            Some(Value::String(status)) => JobState::from_wire(&status),
            _ => JobState::Unknown,
        };

        Self {
            state,
            payload: fields,
        }
    }

    pub fn progress(&self) -> Option<f64> {
        self.payload.get("progress").and_then(Value::as_f64)
    }

    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(Value::as_str)
    }
}
