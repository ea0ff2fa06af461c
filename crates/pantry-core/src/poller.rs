//! Drives one backend job to a terminal status by repeated status checks.
//!
//! ```text
//!            arm()                 terminal / unrecognized / error / max_wait
//!   Idle ──────────────▶ Polling ───────────────────────────────────────────▶ Settled
//!    ▲                    │  ▲ pending: one more check after the policy interval
//!    │     cancel()       │  └──┘
//!    └────────────────────┘
//! ```
//!
//! Every `arm` and `cancel` bumps a generation counter. A task only publishes
//! state while its generation is current, so a superseded or cancelled task can
//! neither fire its scheduled check nor apply a late result.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::api::ApiError;
use crate::clock::Clock;
use crate::config::PollPolicy;
use crate::domain::{JobHandle, JobState, JobStatus};
use crate::CoreError;

/// Issues one status check for a job.
pub trait StatusSource: Send + Sync {
    fn check_status<'a>(
        &'a self,
        handle: &'a JobHandle,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatus, ApiError>> + Send + 'a>>;
}

/// Why a poll settled without a Completed/Failed status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum UnknownCause {
    /// The response did not match the status contract.
    Unrecognized { status: JobStatus },
    /// The status check itself failed; it is not retried.
    CheckFailed {
        #[serde(serialize_with = "serialize_api_error")]
        error: ApiError,
    },
    /// No terminal status within the policy's `max_wait`.
    TimedOut { waited_ms: u64 },
}

impl UnknownCause {
    pub fn describe(&self) -> String {
        match self {
            Self::Unrecognized { .. } => String::from("unrecognized status response"),
            Self::CheckFailed { error } => error.to_string(),
            Self::TimedOut { waited_ms } => {
                format!("no result after {} seconds", waited_ms / 1_000)
            }
        }
    }
}

fn serialize_api_error<S>(error: &ApiError, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&error.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    Completed { status: JobStatus },
    Failed { status: JobStatus },
    Unknown(UnknownCause),
}

impl PollOutcome {
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// `payload.message` of the final status, when there is one.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Completed { status }
            | Self::Failed { status }
            | Self::Unknown(UnknownCause::Unrecognized { status }) => status.message(),
            Self::Unknown(_) => None,
        }
    }
}

/// Final result of polling one handle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settlement {
    pub handle: JobHandle,
    pub outcome: PollOutcome,
    pub attempts: u32,
    pub elapsed_ms: u64,
}

impl Settlement {
    /// The completed status, or the failure as a [`CoreError`].
    pub fn into_result(self) -> Result<JobStatus, CoreError> {
        match self.outcome {
            PollOutcome::Completed { status } => Ok(status),
            PollOutcome::Failed { status } => Err(CoreError::JobFailed {
                message: status
                    .message()
                    .unwrap_or("the job reported failure")
                    .to_owned(),
            }),
            PollOutcome::Unknown(cause) => Err(CoreError::JobUnknown {
                reason: cause.describe(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollerState {
    Idle,
    Polling {
        handle: JobHandle,
        attempts: u32,
        last: Option<JobStatus>,
    },
    Settled(Settlement),
}

/// How a [`PollTask`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollExit {
    Settled(Settlement),
    /// Cancelled or superseded by a newer `arm`; nothing was published.
    Cancelled,
}

#[derive(Debug, Clone)]
struct Tracked {
    generation: u64,
    state: PollerState,
}

struct Shared {
    tracked: watch::Sender<Tracked>,
    // Held for the duration of each status check, across all generations.
    in_flight: Mutex<()>,
}

/// Single-job poller. Clones share state; arming on any clone supersedes the
/// job armed on the others.
#[derive(Clone)]
pub struct Poller {
    source: Arc<dyn StatusSource>,
    clock: Arc<dyn Clock>,
    shared: Arc<Shared>,
}

impl Poller {
    pub fn new(source: Arc<dyn StatusSource>, clock: Arc<dyn Clock>) -> Self {
        let (tracked, _) = watch::channel(Tracked {
            generation: 0,
            state: PollerState::Idle,
        });
        Self {
            source,
            clock,
            shared: Arc::new(Shared {
                tracked,
                in_flight: Mutex::new(()),
            }),
        }
    }

    /// Start polling `handle`, cancelling whatever was armed before.
    ///
    /// Nothing is sent until the returned task is awaited.
    pub fn arm(&self, handle: JobHandle, policy: PollPolicy) -> PollTask {
        let mut generation = 0;
        self.shared.tracked.send_modify(|tracked| {
            tracked.generation += 1;
            generation = tracked.generation;
            tracked.state = PollerState::Polling {
                handle: handle.clone(),
                attempts: 0,
                last: None,
            };
        });
        tracing::debug!(%handle, generation, "poll armed");

        PollTask {
            poller: self.clone(),
            handle,
            policy,
            generation,
            observed: None,
        }
    }

    /// Arm and drive to completion.
    pub async fn poll(&self, handle: JobHandle, policy: PollPolicy) -> PollExit {
        self.arm(handle, policy).run().await
    }

    /// Back to `Idle`; no further check is issued for the armed handle.
    pub fn cancel(&self) {
        self.shared.tracked.send_modify(|tracked| {
            tracked.generation += 1;
            tracked.state = PollerState::Idle;
        });
    }

    pub fn state(&self) -> PollerState {
        self.shared.tracked.borrow().state.clone()
    }

    pub fn subscribe(&self) -> PollerWatch {
        PollerWatch {
            receiver: self.shared.tracked.subscribe(),
        }
    }
}

/// Receiver side of poller state changes.
pub struct PollerWatch {
    receiver: watch::Receiver<Tracked>,
}

impl PollerWatch {
    pub fn current(&self) -> PollerState {
        self.receiver.borrow().state.clone()
    }

    /// Next state after the last one seen; `None` once the poller is gone.
    pub async fn changed(&mut self) -> Option<PollerState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().state.clone())
    }
}

/// One armed poll. Dropping it stops polling at the next suspension point.
pub struct PollTask {
    poller: Poller,
    handle: JobHandle,
    policy: PollPolicy,
    generation: u64,
    observed: Option<JobStatus>,
}

impl PollTask {
    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    /// Start from a status the caller already fetched. The first check is
    /// issued one interval later instead of immediately.
    pub fn starting_from(mut self, status: JobStatus) -> Self {
        self.observed = Some(status);
        self
    }

    pub async fn run(mut self) -> PollExit {
        let clock = self.poller.clock.clone();
        let started = clock.now();
        let mut attempts: u32 = 0;
        let mut generations = self.poller.shared.tracked.subscribe();

        loop {
            let checked = match self.observed.take() {
                Some(status) => Ok(status),
                None => {
                    let _in_flight = self.poller.shared.in_flight.lock().await;
                    if !self.is_current() {
                        return self.cancelled("before status check");
                    }
                    attempts += 1;
                    tracing::debug!(
                        handle = %self.handle,
                        attempt = attempts,
                        "checking job status"
                    );
                    self.poller.source.check_status(&self.handle).await
                }
            };

            let elapsed = clock.now().saturating_since(started);
            let status = match checked {
                Ok(status) if status.state == JobState::Pending => status,
                Ok(status) => {
                    let outcome = match status.state {
                        JobState::Completed => PollOutcome::Completed { status },
                        JobState::Failed => PollOutcome::Failed { status },
                        JobState::Pending | JobState::Unknown => {
                            PollOutcome::Unknown(UnknownCause::Unrecognized { status })
                        }
                    };
                    return self.settle(outcome, attempts, elapsed);
                }
                Err(error) => {
                    tracing::warn!(handle = %self.handle, %error, "status check failed");
                    let outcome = PollOutcome::Unknown(UnknownCause::CheckFailed { error });
                    return self.settle(outcome, attempts, elapsed);
                }
            };

            if let Some(max_wait) = self.policy.max_wait {
                if elapsed >= max_wait {
                    let outcome = PollOutcome::Unknown(UnknownCause::TimedOut {
                        waited_ms: millis(elapsed),
                    });
                    return self.settle(outcome, attempts, elapsed);
                }
            }

            if let Some(message) = status.message() {
                tracing::info!(handle = %self.handle, progress = ?status.progress(), "{message}");
            }

            let published = self.publish(PollerState::Polling {
                handle: self.handle.clone(),
                attempts,
                last: Some(status),
            });
            if !published {
                return self.cancelled("after pending status");
            }

            let generation = self.generation;
            tokio::select! {
                biased;
                _ = superseded(&mut generations, generation) => {
                    return self.cancelled("while waiting for next check");
                }
                _ = clock.sleep(self.policy.interval) => {}
            }
        }
    }

    fn is_current(&self) -> bool {
        self.poller.shared.tracked.borrow().generation == self.generation
    }

    /// Replace the published state if this task is still current.
    fn publish(&self, state: PollerState) -> bool {
        let generation = self.generation;
        self.poller.shared.tracked.send_if_modified(move |tracked| {
            if tracked.generation != generation {
                return false;
            }
            tracked.state = state;
            true
        })
    }

    fn settle(&self, outcome: PollOutcome, attempts: u32, elapsed: Duration) -> PollExit {
        let settlement = Settlement {
            handle: self.handle.clone(),
            outcome,
            attempts,
            elapsed_ms: millis(elapsed),
        };

        if !self.publish(PollerState::Settled(settlement.clone())) {
            return self.cancelled("late result");
        }

        tracing::info!(
            handle = %self.handle,
            attempts,
            elapsed_ms = settlement.elapsed_ms,
            completed = settlement.outcome.is_completed(),
            "job settled"
        );
        PollExit::Settled(settlement)
    }

    fn cancelled(&self, stage: &'static str) -> PollExit {
        tracing::debug!(handle = %self.handle, stage, "poll superseded; result discarded");
        PollExit::Cancelled
    }
}

async fn superseded(receiver: &mut watch::Receiver<Tracked>, generation: u64) {
    let _ = receiver
        .wait_for(|tracked| tracked.generation != generation)
        .await;
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
