//! # Domain Models
//!
//! Validated client-side types shared by the poller, the cache and the flows.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`JobHandle`] | Identifies an in-flight backend job |
//! | [`JobStatus`] | Result of one status check |
//! | [`Email`] | Validated email address |
//! | [`SignupForm`] / [`LoginForm`] | Form input validated before submission |
//! | [`VerificationCode`] | Email verification code |
//! | [`UserProfile`] | Profile returned by the backend |
//! | [`EpochMillis`] | Millisecond timestamp used for cache entries |
//!
//! Construction validates every invariant, so a value that exists is one the
//! backend can be sent.

mod email;
mod forms;
mod job;
mod timestamp;
mod user;

pub use email::Email;
pub use forms::{LoginForm, SignupForm, VerificationCode, MIN_PASSWORD_LEN};
pub use job::{JobHandle, JobKind, JobState, JobStatus};
pub use timestamp::EpochMillis;
pub use user::UserProfile;
