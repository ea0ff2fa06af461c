//! Time source and scheduler used by the poller and the local cache.
//!
//! Nothing in this crate reads the wall clock or sleeps directly; both go
//! through [`Clock`] so tests can run on virtual time.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;

use crate::domain::EpochMillis;

pub trait Clock: Send + Sync {
    fn now(&self) -> EpochMillis;

    /// Resolve after `duration`. Must be cancel-safe: dropping the future
    /// before it resolves has no effect.
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Wall clock plus tokio timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> EpochMillis {
        EpochMillis::from_offset_datetime(OffsetDateTime::now_utc())
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Virtual clock: `sleep` advances time immediately and records the request.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    pub fn new(start: EpochMillis) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start.as_i64())),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        self.now_ms.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, now: EpochMillis) {
        self.now_ms.store(now.as_i64(), Ordering::SeqCst);
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        match self.sleeps.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().into_iter().sum()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(EpochMillis::new(1_700_000_000_000))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> EpochMillis {
        EpochMillis::new(self.now_ms.load(Ordering::SeqCst))
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            match self.sleeps.lock() {
                Ok(mut guard) => guard.push(duration),
                Err(poisoned) => poisoned.into_inner().push(duration),
            }
            self.advance(duration);
            // Give other tasks (cancellation, observers) a chance to run.
            tokio::task::yield_now().await;
        })
    }
}
