//! Per-screen view state: `Idle -> Loading -> Ready | Error`, with an
//! `AwaitingJob` detour while a backend job is being polled.
//!
//! [`Screen`] rejects transitions that would render inconsistent content:
//! `Ready` data while a job is still running, a second terminal message for
//! the same job, or any update after the screen was unmounted.
//!
//! Every flow starts with [`Screen::begin_loading`], so running a flow again
//! on a `Ready` or `Error` screen is the retry action.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{JobHandle, JobStatus};
use crate::poller::{PollOutcome, Settlement};

pub const STALE_NOTICE: &str = "Data may be outdated";

/// Where the data shown on a ready screen came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Fetched from the network during this load.
    Live,
    /// Served from a cache entry inside the freshness window.
    Cached,
    /// Served from an expired cache entry because the fetch failed.
    Stale,
}

/// Where the user can go after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    Retry,
    Login,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobProgressView {
    pub handle: JobHandle,
    pub progress: Option<f64>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadyView {
    pub data: Value,
    pub freshness: Freshness,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorView {
    pub message: String,
    pub next: NextStep,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewState {
    Idle,
    Loading,
    AwaitingJob(JobProgressView),
    Ready(ReadyView),
    Error(ErrorView),
}

impl ViewState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::AwaitingJob(_) => "awaiting_job",
            Self::Ready(_) => "ready",
            Self::Error(_) => "error",
        }
    }

    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {event} while {from}")]
    Illegal {
        from: &'static str,
        event: &'static str,
    },
    #[error("job {got} is not the job this screen is waiting for")]
    JobMismatch { got: String },
    #[error("job {handle} already reported its result")]
    AlreadyAnnounced { handle: String },
    #[error("screen is unmounted")]
    Unmounted,
}

/// State holder for one screen.
#[derive(Debug)]
pub struct Screen {
    state: ViewState,
    // Last job whose result was shown; cleared when the next job is awaited.
    announced: Option<JobHandle>,
    mounted: bool,
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen {
    pub fn new() -> Self {
        Self {
            state: ViewState::Idle,
            announced: None,
            mounted: true,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn into_state(self) -> ViewState {
        self.state
    }

    pub const fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Detach the screen; later results are dropped.
    pub fn unmount(&mut self) {
        self.mounted = false;
    }

    /// Idle, Ready or Error -> Loading. From Ready or Error this is a retry.
    pub fn begin_loading(&mut self) -> Result<(), TransitionError> {
        self.ensure_mounted()?;
        match self.state {
            ViewState::Idle | ViewState::Ready(_) | ViewState::Error(_) => {
                self.state = ViewState::Loading;
                Ok(())
            }
            _ => Err(self.illegal("begin loading")),
        }
    }

    /// Loading -> AwaitingJob. Starts a new job, even when its handle matches
    /// a job that already settled on this screen.
    pub fn await_job(&mut self, handle: JobHandle) -> Result<(), TransitionError> {
        self.ensure_mounted()?;
        if !matches!(self.state, ViewState::Loading) {
            return Err(self.illegal("await a job"));
        }

        self.announced = None;
        self.state = ViewState::AwaitingJob(JobProgressView {
            handle,
            progress: None,
            message: None,
        });
        Ok(())
    }

    /// Record a pending status for the job being awaited.
    pub fn job_progress(
        &mut self,
        handle: &JobHandle,
        status: &JobStatus,
    ) -> Result<(), TransitionError> {
        self.ensure_mounted()?;
        let illegal = self.illegal("report job progress");
        let ViewState::AwaitingJob(view) = &mut self.state else {
            return Err(illegal);
        };
        if &view.handle != handle {
            return Err(TransitionError::JobMismatch {
                got: handle.to_string(),
            });
        }

        view.progress = status.progress().or(view.progress);
        if let Some(message) = status.message() {
            view.message = Some(message.to_owned());
        }
        Ok(())
    }

    /// AwaitingJob -> Ready (completed) or Error (failed / unknown).
    ///
    /// A job's result is shown at most once.
    pub fn resolve_job(&mut self, settlement: &Settlement) -> Result<(), TransitionError> {
        self.ensure_mounted()?;
        let ViewState::AwaitingJob(view) = &self.state else {
            if self.announced.as_ref() == Some(&settlement.handle) {
                return Err(TransitionError::AlreadyAnnounced {
                    handle: settlement.handle.to_string(),
                });
            }
            return Err(self.illegal("resolve a job"));
        };
        if view.handle != settlement.handle {
            return Err(TransitionError::JobMismatch {
                got: settlement.handle.to_string(),
            });
        }

        self.announced = Some(settlement.handle.clone());
        let message = settlement.outcome.message().map(str::to_owned);

        self.state = match &settlement.outcome {
            PollOutcome::Completed { status } => ViewState::Ready(ReadyView {
                data: Value::Object(status.payload.clone()),
                freshness: Freshness::Live,
                notice: message,
            }),
            PollOutcome::Failed { .. } => ViewState::Error(ErrorView {
                message: message
                    .unwrap_or_else(|| String::from("The request could not be completed")),
                next: NextStep::Login,
            }),
            PollOutcome::Unknown(cause) => ViewState::Error(ErrorView {
                message: message.unwrap_or_else(|| cause.describe()),
                next: NextStep::Login,
            }),
        };
        Ok(())
    }

    /// Loading -> Ready. Never allowed while a job is awaited.
    pub fn ready(&mut self, data: Value, freshness: Freshness) -> Result<(), TransitionError> {
        self.ensure_mounted()?;
        if !matches!(self.state, ViewState::Loading) {
            return Err(self.illegal("show data"));
        }

        let notice = (freshness == Freshness::Stale).then(|| String::from(STALE_NOTICE));
        self.state = ViewState::Ready(ReadyView {
            data,
            freshness,
            notice,
        });
        Ok(())
    }

    /// Loading or AwaitingJob -> Error.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        next: NextStep,
    ) -> Result<(), TransitionError> {
        self.ensure_mounted()?;
        if let ViewState::AwaitingJob(view) = &self.state {
            // The failure is this job's one terminal message.
            self.announced = Some(view.handle.clone());
        } else if !matches!(self.state, ViewState::Loading) {
            return Err(self.illegal("show an error"));
        }

        self.state = ViewState::Error(ErrorView {
            message: message.into(),
            next,
        });
        Ok(())
    }

    fn ensure_mounted(&self) -> Result<(), TransitionError> {
        if self.mounted {
            Ok(())
        } else {
            Err(TransitionError::Unmounted)
        }
    }

    fn illegal(&self, event: &'static str) -> TransitionError {
        TransitionError::Illegal {
            from: self.state.name(),
            event,
        }
    }
}
