//! # Pantry Core
//!
//! Client-side core of the Pantry Tracker: account flows, polling of
//! long-running backend jobs, a local cache of expensive fetches and the
//! per-screen view state that ties them together.
//!
//! ## Overview
//!
//! - **Job poller** that drives one backend job to a terminal status, at most
//!   one status check in flight, with cancellation and late-result suppression
//! - **Local cache** with a freshness window and stale fallback
//! - **View state machine** (`Idle -> Loading -> AwaitingJob -> Ready | Error`)
//! - **Account flows** for signup, verification and login with pending jobs
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | JSON request layer and [`ApiError`] |
//! | [`backend`] | Pantry REST endpoints and job status checks |
//! | [`cache`] | Local cache of fetch results |
//! | [`clock`] | Injectable time source and scheduler |
//! | [`config`] | Client configuration and `PANTRY_*` environment overrides |
//! | [`domain`] | Validated domain types |
//! | [`error`] | Validation and flow errors |
//! | [`flows`] | User-facing flows over a [`Screen`] |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`poller`] | Job poller |
//! | [`session`] | Persisted credentials and pending login |
//! | [`storage`] | Key-value persistence |
//! | [`view`] | Per-screen view state |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use pantry_core::{ClientConfig, FileStore, PantryClient, Screen};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FileStore::open("state.json")?);
//!     let client = PantryClient::with_defaults(ClientConfig::from_env()?, store)?;
//!
//!     let mut screen = Screen::new();
//!     client.dashboard(&mut screen, false).await?;
//!     println!("{}", serde_json::to_string_pretty(screen.state())?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Screen   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  PantryClient   │────▶│ LocalCache       │
//! │  (flows)        │     │ (KeyValueStore)  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Poller          │────▶│ Clock            │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ PantryBackend   │────▶│ HTTP Client      │
//! │ (StatusSource)  │     │ (reqwest)        │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Form input is validated into typed values before any request
//! ([`ValidationError`]). Once a flow has started loading, request and
//! storage failures end on the screen as an error view; [`CoreError`] is
//! returned for state machine failures and for [`PantryClient::logout`].

pub mod api;
pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod flows;
pub mod http_client;
pub mod poller;
pub mod session;
pub mod storage;
pub mod view;

pub use api::{ApiClient, ApiError};
pub use backend::{AccountOutcome, PantryBackend, PriceTrendQuery, Submission};
pub use cache::{CacheEntry, CacheKey, LocalCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, PollPolicy, PollingConfig};
pub use domain::{
    Email, EpochMillis, JobHandle, JobKind, JobState, JobStatus, LoginForm, SignupForm,
    UserProfile, VerificationCode,
};
pub use error::{CoreError, ValidationError};
pub use flows::PantryClient;
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};
pub use poller::{
    PollExit, PollOutcome, Poller, PollerState, Settlement, StatusSource, UnknownCause,
};
pub use session::{PendingLogin, Session};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageKey, StoreError};
pub use view::{
    ErrorView, Freshness, JobProgressView, NextStep, ReadyView, Screen, TransitionError, ViewState,
    STALE_NOTICE,
};
