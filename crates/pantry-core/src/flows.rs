//! User-facing flows: each one drives a [`Screen`] from `Loading` to a final
//! `Ready` or `Error` state.
//!
//! | Flow | Screen path |
//! |------|-------------|
//! | [`register`](PantryClient::register) | Loading -> Ready / Error |
//! | [`verify_email`](PantryClient::verify_email) | Loading -> (AwaitingJob) -> Ready / Error |
//! | [`login`](PantryClient::login) | Loading -> (AwaitingJob) -> Ready / Error |
//! | [`dashboard`](PantryClient::dashboard) | Loading -> (AwaitingJob -> Loading) -> Ready / Error |
//! | [`price_trends`](PantryClient::price_trends) | Loading -> Ready / Error |
//! | [`watch_job`](PantryClient::watch_job) | Loading -> AwaitingJob -> Ready / Error |
//!
//! Once a flow has put its screen in `Loading`, every failure ends on the
//! screen as an error banner. Only state machine errors are returned.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::api::ApiClient;
use crate::backend::{PantryBackend, PriceTrendQuery, Submission};
use crate::cache::{CacheEntry, CacheKey, LocalCache};
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::domain::{
    Email, JobHandle, JobState, JobStatus, LoginForm, SignupForm, VerificationCode,
};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::poller::{PollExit, Poller, PollerState, Settlement};
use crate::session::Session;
use crate::storage::KeyValueStore;
use crate::view::{Freshness, NextStep, Screen};
use crate::{CoreError, ValidationError};

const SIGN_IN_INCOMPLETE: &str = "Sign-in could not be completed. Please sign in again.";

/// Everything a flow needs, built once per process.
#[derive(Clone)]
pub struct PantryClient {
    config: ClientConfig,
    backend: Arc<PantryBackend>,
    cache: LocalCache,
    poller: Poller,
}

impl PantryClient {
    pub fn new(
        config: ClientConfig,
        http_client: Arc<dyn HttpClient>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ValidationError> {
        let api = ApiClient::new(config.api_url.as_str(), http_client)?
            .with_timeout_ms(config.timeout_ms);
        let backend = Arc::new(PantryBackend::new(api, Session::new(store.clone())));
        let poller = Poller::new(backend.clone(), clock.clone());

        Ok(Self {
            config,
            backend,
            cache: LocalCache::new(store, clock),
            poller,
        })
    }

    /// reqwest transport and the wall clock.
    pub fn with_defaults(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ValidationError> {
        Self::new(
            config,
            Arc::new(ReqwestHttpClient::new()),
            store,
            Arc::new(SystemClock),
        )
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn backend(&self) -> &PantryBackend {
        &self.backend
    }

    pub fn session(&self) -> &Session {
        self.backend.session()
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub async fn register(&self, screen: &mut Screen, form: &SignupForm) -> Result<(), CoreError> {
        screen.begin_loading()?;
        match self.backend.register(form).await {
            Ok(outcome) => screen.ready(to_data(&outcome), Freshness::Live)?,
            Err(error) => show_failure(screen, error, NextStep::Retry)?,
        }
        Ok(())
    }

    pub async fn resend_verification(
        &self,
        screen: &mut Screen,
        email: &Email,
    ) -> Result<(), CoreError> {
        screen.begin_loading()?;
        match self.backend.resend_verification(email).await {
            Ok(outcome) => screen.ready(to_data(&outcome), Freshness::Live)?,
            Err(error) => show_failure(screen, error, NextStep::Retry)?,
        }
        Ok(())
    }

    /// Submit a verification code; waits for the verification job when the
    /// backend answers `pending`.
    pub async fn verify_email(
        &self,
        screen: &mut Screen,
        email: &Email,
        code: &VerificationCode,
    ) -> Result<(), CoreError> {
        screen.begin_loading()?;
        match self.backend.verify_email(email, code).await {
            Ok(Submission::Done(outcome)) => screen.ready(to_data(&outcome), Freshness::Live)?,
            Ok(Submission::Pending(handle)) => {
                self.run_job(screen, handle, None).await?;
            }
            Err(error) => show_failure(screen, error, NextStep::Retry)?,
        }
        Ok(())
    }

    /// Sign in. Returns whether an authenticated session exists afterwards.
    ///
    /// A pending login is promoted only when its job completes; any other
    /// outcome drops it and the screen points back to the login form.
    pub async fn login(&self, screen: &mut Screen, form: &LoginForm) -> Result<bool, CoreError> {
        screen.begin_loading()?;
        let signed_in = self.sign_in(screen, form).await;
        on_screen(screen, signed_in)
    }

    async fn sign_in(&self, screen: &mut Screen, form: &LoginForm) -> Result<bool, CoreError> {
        let handle = match self.backend.login(form).await {
            Ok(Submission::Done(outcome)) => {
                screen.ready(to_data(&outcome), Freshness::Live)?;
                return Ok(outcome.signed_in);
            }
            Ok(Submission::Pending(handle)) => handle,
            Err(error) => {
                show_failure(screen, error, NextStep::Retry)?;
                return Ok(false);
            }
        };

        let Some(settlement) = self.poll_job(screen, handle, None).await? else {
            return Ok(false);
        };
        if !settlement.outcome.is_completed() {
            self.backend.abandon_pending_login()?;
            screen.resolve_job(&settlement)?;
            if let Err(error) = settlement.into_result() {
                tracing::warn!(code = error.code(), %error, "pending login dropped");
            }
            return Ok(false);
        }

        if self.backend.complete_pending_login()? {
            screen.resolve_job(&settlement)?;
            return Ok(true);
        }
        tracing::warn!(handle = %settlement.handle, "job completed without a pending token");
        screen.fail(SIGN_IN_INCOMPLETE, NextStep::Login)?;
        Ok(false)
    }

    /// Dashboard with cache-aside: a fresh entry is shown without touching the
    /// network unless `refresh` is set. When the fetch fails, an expired entry
    /// is shown with the outdated notice instead of an error.
    pub async fn dashboard(&self, screen: &mut Screen, refresh: bool) -> Result<(), CoreError> {
        screen.begin_loading()?;
        let loaded = self.load_dashboard(screen, refresh).await;
        on_screen(screen, loaded)
    }

    async fn load_dashboard(&self, screen: &mut Screen, refresh: bool) -> Result<(), CoreError> {
        let cached = self.read_cache(CacheKey::Dashboard).await;
        if let Some(entry) = self.fresh(cached.as_ref(), refresh) {
            tracing::debug!(fetched_at = %entry.fetched_at, "dashboard served from cache");
            screen.ready(entry.value.clone(), Freshness::Cached)?;
            return Ok(());
        }

        if !self.session().is_authenticated()? {
            return fall_back(screen, cached, CoreError::NotSignedIn);
        }

        match self.backend.own_job_status().await {
            Ok(status) if status.state == JobState::Pending => {
                let handle = self.backend.dashboard_job_handle()?;
                match self.run_job(screen, handle, Some(status)).await? {
                    Some(settlement) if settlement.outcome.is_completed() => {
                        screen.begin_loading()?;
                    }
                    Some(settlement) => {
                        // Background aggregation failures are not fatal when
                        // there is something to show.
                        if let Some(entry) = cached {
                            tracing::warn!(
                                handle = %settlement.handle,
                                "aggregation did not complete; showing cached dashboard"
                            );
                            screen.begin_loading()?;
                            screen.ready(entry.value, Freshness::Stale)?;
                        }
                        return Ok(());
                    }
                    None => return Ok(()),
                }
            }
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(code = error.code(), %error, "aggregation status unavailable");
            }
        }

        match self.backend.dashboard().await {
            Ok(value) => {
                self.write_cache(CacheKey::Dashboard, &value).await;
                screen.ready(value, Freshness::Live)?;
                Ok(())
            }
            Err(error) => fall_back(screen, cached, error),
        }
    }

    /// Price trends. Only the unfiltered query is cached.
    pub async fn price_trends(
        &self,
        screen: &mut Screen,
        query: &PriceTrendQuery,
        refresh: bool,
    ) -> Result<(), CoreError> {
        screen.begin_loading()?;
        let loaded = self.load_price_trends(screen, query, refresh).await;
        on_screen(screen, loaded)
    }

    async fn load_price_trends(
        &self,
        screen: &mut Screen,
        query: &PriceTrendQuery,
        refresh: bool,
    ) -> Result<(), CoreError> {
        let cached = if query.is_unfiltered() {
            self.read_cache(CacheKey::PriceTrends).await
        } else {
            None
        };
        if let Some(entry) = self.fresh(cached.as_ref(), refresh) {
            screen.ready(entry.value.clone(), Freshness::Cached)?;
            return Ok(());
        }

        match self.backend.price_trends(query).await {
            Ok(value) => {
                if query.is_unfiltered() {
                    self.write_cache(CacheKey::PriceTrends, &value).await;
                }
                screen.ready(value, Freshness::Live)?;
                Ok(())
            }
            Err(error) => fall_back(screen, cached, error),
        }
    }

    /// Poll an existing job until it settles.
    pub async fn watch_job(
        &self,
        screen: &mut Screen,
        handle: JobHandle,
    ) -> Result<Option<Settlement>, CoreError> {
        screen.begin_loading()?;
        self.run_job(screen, handle, None).await
    }

    /// Drop the session and every cached resource.
    pub async fn logout(&self) -> Result<(), CoreError> {
        self.poller.cancel();
        self.cache.invalidate_all().await?;
        self.session().end()?;
        tracing::info!("signed out");
        Ok(())
    }

    fn fresh<'e>(&self, cached: Option<&'e CacheEntry>, refresh: bool) -> Option<&'e CacheEntry> {
        if refresh {
            return None;
        }
        cached.filter(|entry| self.cache.is_fresh(entry, self.config.freshness_window))
    }

    /// An unreadable cache is a miss.
    async fn read_cache(&self, key: CacheKey) -> Option<CacheEntry> {
        match self.cache.read(key).await {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(?key, %error, "cache read failed; fetching instead");
                None
            }
        }
    }

    /// The fetched value is shown even when it cannot be cached.
    async fn write_cache(&self, key: CacheKey, value: &Value) {
        if let Err(error) = self.cache.write(key, value).await {
            tracing::warn!(?key, %error, "cache write failed");
        }
    }

    /// Poll, then show the job's one result.
    async fn run_job(
        &self,
        screen: &mut Screen,
        handle: JobHandle,
        observed: Option<JobStatus>,
    ) -> Result<Option<Settlement>, CoreError> {
        let settled = self.poll_job(screen, handle, observed).await?;
        if let Some(settlement) = &settled {
            screen.resolve_job(settlement)?;
        }
        Ok(settled)
    }

    /// Loading -> AwaitingJob, then poll until the job settles. The caller
    /// shows the result.
    ///
    /// Returns `None` when the poll was superseded or the screen went away.
    async fn poll_job(
        &self,
        screen: &mut Screen,
        handle: JobHandle,
        observed: Option<JobStatus>,
    ) -> Result<Option<Settlement>, CoreError> {
        screen.await_job(handle.clone())?;
        let policy = self.config.poll_policy(handle.kind());

        let mut updates = self.poller.subscribe();
        let mut task = self.poller.arm(handle.clone(), policy);
        if let Some(status) = observed {
            task = task.starting_from(status);
        }
        let run = task.run();
        tokio::pin!(run);

        let exit = loop {
            tokio::select! {
                exit = &mut run => break exit,
                Some(state) = updates.changed() => {
                    if let PollerState::Polling { handle: polled, last: Some(status), .. } = state {
                        if polled == handle && screen.is_mounted() {
                            screen.job_progress(&handle, &status)?;
                        }
                    }
                }
            }
        };

        match exit {
            PollExit::Settled(settlement) if screen.is_mounted() => Ok(Some(settlement)),
            PollExit::Settled(settlement) => {
                tracing::debug!(handle = %settlement.handle, "screen unmounted; result dropped");
                Ok(None)
            }
            PollExit::Cancelled => Ok(None),
        }
    }
}

fn to_data<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

/// Show a failure as an error banner; transition errors are returned.
fn show_failure(screen: &mut Screen, error: CoreError, next: NextStep) -> Result<(), CoreError> {
    let next = match &error {
        CoreError::Transition(_) => return Err(error),
        CoreError::NotSignedIn => NextStep::Login,
        CoreError::Api(api) if api.status() == Some(401) => NextStep::Login,
        _ => next,
    };

    tracing::warn!(code = error.code(), %error, "request failed");
    screen.fail(error.user_message(), next)?;
    Ok(())
}

/// Finish a flow body: an error that escaped it ends on the screen.
fn on_screen<T: Default>(
    screen: &mut Screen,
    result: Result<T, CoreError>,
) -> Result<T, CoreError> {
    match result {
        Ok(value) => Ok(value),
        Err(error) => {
            show_failure(screen, error, NextStep::Retry)?;
            Ok(T::default())
        }
    }
}

/// Stale entry if there is one, else the error.
fn fall_back(
    screen: &mut Screen,
    cached: Option<CacheEntry>,
    error: CoreError,
) -> Result<(), CoreError> {
    match cached {
        Some(entry) if !matches!(error, CoreError::NotSignedIn) => {
            tracing::warn!(code = error.code(), %error, "fetch failed; showing cached data");
            screen.ready(entry.value, Freshness::Stale)?;
            Ok(())
        }
        _ => show_failure(screen, error, NextStep::Retry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::view::ViewState;

    #[test]
    fn unauthorized_requests_point_to_login() {
        let mut screen = Screen::new();
        screen.begin_loading().expect("loading");

        show_failure(
            &mut screen,
            CoreError::Api(ApiError::Status {
                status: 401,
                message: String::from("Invalid token"),
            }),
            NextStep::Retry,
        )
        .expect("shown");

        let ViewState::Error(view) = screen.state() else {
            panic!("expected error");
        };
        assert_eq!(view.next, NextStep::Login);
        assert_eq!(view.message, "Invalid token");
    }

    #[test]
    fn store_failures_end_on_the_screen() {
        let mut screen = Screen::new();
        screen.begin_loading().expect("loading");

        let result: Result<bool, CoreError> = on_screen(
            &mut screen,
            Err(CoreError::Store(crate::storage::StoreError::Poisoned)),
        );

        assert!(!result.expect("rendered"));
        assert!(matches!(
            screen.state(),
            ViewState::Error(view) if view.next == NextStep::Retry
        ));
    }

    #[test]
    fn transition_errors_are_returned() {
        let mut screen = Screen::new();
        screen.begin_loading().expect("loading");
        screen.unmount();

        let result = show_failure(&mut screen, CoreError::NotSignedIn, NextStep::Retry);

        assert!(matches!(
            result,
            Err(CoreError::Transition(crate::view::TransitionError::Unmounted))
        ));
        assert_eq!(screen.state(), &ViewState::Loading);
    }
}
