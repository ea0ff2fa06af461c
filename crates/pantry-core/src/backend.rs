//! Pantry REST endpoints used by the account and dashboard flows.
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | [`register`](PantryBackend::register) | `POST /users/register` |
//! | [`verify_email`](PantryBackend::verify_email) | `POST /users/verify-email` |
//! | [`resend_verification`](PantryBackend::resend_verification) | `POST /users/resend-verification` |
//! | [`login`](PantryBackend::login) | `POST /users/login` |
//! | status by email | `POST /users/data-fetch-status-by-email` |
//! | status by user id | `GET /users/data-fetch-status/:userId` |
//! | own status | `GET /users/data-fetch-status` (bearer) |
//! | [`dashboard`](PantryBackend::dashboard) | `GET /dashboard` (bearer) |
//! | [`price_trends`](PantryBackend::price_trends) | `GET /dashboard/price-trends` (bearer) |
//!
//! Submissions that start a backend job return [`Submission::Pending`] with
//! the handle to poll instead of a result.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::{ApiClient, ApiError};
use crate::domain::{
    Email, JobHandle, JobKind, JobStatus, LoginForm, SignupForm, UserProfile, VerificationCode,
};
use crate::poller::StatusSource;
use crate::session::Session;
use crate::CoreError;

/// Result of a submit: either final, or a job that has to be polled.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission<T> {
    Done(T),
    Pending(JobHandle),
}

/// What an account action produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountOutcome {
    pub message: Option<String>,
    pub signed_in: bool,
    pub user: Option<UserProfile>,
}

/// Filter for `GET /dashboard/price-trends`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceTrendQuery {
    pub product_id: Option<String>,
    pub days: Option<u32>,
}

impl PriceTrendQuery {
    pub fn is_unfiltered(&self) -> bool {
        self.product_id.is_none() && self.days.is_none()
    }

    fn to_path(&self) -> String {
        let mut params = Vec::new();
        if let Some(product_id) = &self.product_id {
            params.push(format!("productId={}", urlencoding::encode(product_id)));
        }
        if let Some(days) = self.days {
            params.push(format!("days={days}"));
        }

        if params.is_empty() {
            String::from("/dashboard/price-trends")
        } else {
            format!("/dashboard/price-trends?{}", params.join("&"))
        }
    }
}

/// Shape shared by register, verify and login responses. Every field is
/// optional; the backend sends different subsets per endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<UserProfile>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "user_id")]
    user_id: Option<Value>,
}

impl AccountResponse {
    fn parse(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|error| {
            tracing::warn!(%error, "unexpected account response shape");
            Self::default()
        })
    }

    fn is_pending(&self) -> bool {
        self.status.as_deref() == Some("pending")
    }

    fn user_id(&self) -> Option<String> {
        let from_field = match &self.user_id {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };
        from_field
            .or_else(|| self.user.as_ref().map(|user| user.id.clone()))
            .filter(|id| !id.trim().is_empty())
    }
}

/// Backend endpoints bound to one session.
#[derive(Clone)]
pub struct PantryBackend {
    api: ApiClient,
    session: Session,
}

impl PantryBackend {
    pub fn new(api: ApiClient, session: Session) -> Self {
        Self { api, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub async fn register(&self, form: &SignupForm) -> Result<AccountOutcome, CoreError> {
        let response = self
            .api
            .post("/users/register", &form.to_body(), None)
            .await?;
        let response = AccountResponse::parse(response);
        tracing::info!(email = %form.email(), "account registered");

        Ok(AccountOutcome {
            message: response.message,
            signed_in: false,
            user: response.user,
        })
    }

    pub async fn verify_email(
        &self,
        email: &Email,
        code: &VerificationCode,
    ) -> Result<Submission<AccountOutcome>, CoreError> {
        let body = json!({ "email": email.as_str(), "code": code.as_str() });
        let response =
            AccountResponse::parse(self.api.post("/users/verify-email", &body, None).await?);

        if response.is_pending() {
            if let Some(token) = response.token.as_deref() {
                self.session.set_pending_login(email, Some(token))?;
            }
            return Ok(Submission::Pending(JobHandle::email_verification(email)));
        }

        self.finish_account_response(response)
    }

    pub async fn resend_verification(&self, email: &Email) -> Result<AccountOutcome, CoreError> {
        let body = json!({ "email": email.as_str() });
        let response = AccountResponse::parse(
            self.api
                .post("/users/resend-verification", &body, None)
                .await?,
        );

        Ok(AccountOutcome {
            message: response.message,
            signed_in: false,
            user: None,
        })
    }

    pub async fn login(&self, form: &LoginForm) -> Result<Submission<AccountOutcome>, CoreError> {
        let response = AccountResponse::parse(
            self.api
                .post("/users/login", &form.to_body(), None)
                .await?,
        );

        if response.is_pending() {
            self.session
                .set_pending_login(form.email(), response.token.as_deref())?;
            let handle = match response.user_id() {
                Some(user_id) => JobHandle::new(JobKind::AccountDataFetch, &user_id)?,
                None => JobHandle::email_verification(form.email()),
            };
            tracing::info!(%handle, "login waiting for account data");
            return Ok(Submission::Pending(handle));
        }

        self.finish_account_response(response)
    }

    /// After a pending login's job completed: activate the pending token.
    /// Returns false when the user has to sign in again.
    pub fn complete_pending_login(&self) -> Result<bool, CoreError> {
        Ok(self.session.promote_pending_login()?)
    }

    pub fn abandon_pending_login(&self) -> Result<(), CoreError> {
        Ok(self.session.clear_pending_login()?)
    }

    /// One check of the signed-in user's own aggregation job.
    pub async fn own_job_status(&self) -> Result<JobStatus, CoreError> {
        let token = self.require_token()?;
        let value = self
            .api
            .get("/users/data-fetch-status", Some(&token))
            .await?;
        Ok(JobStatus::from_value(value))
    }

    pub async fn dashboard(&self) -> Result<Value, CoreError> {
        let token = self.require_token()?;
        Ok(self.api.get("/dashboard", Some(&token)).await?)
    }

    pub async fn price_trends(&self, query: &PriceTrendQuery) -> Result<Value, CoreError> {
        let token = self.require_token()?;
        Ok(self.api.get(&query.to_path(), Some(&token)).await?)
    }

    /// Key for the dashboard aggregation handle: the stored user id when known.
    pub fn dashboard_job_handle(&self) -> Result<JobHandle, CoreError> {
        let key = self
            .session
            .user()?
            .map(|user| user.id)
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| String::from("me"));
        Ok(JobHandle::new(JobKind::DashboardAggregate, &key)?)
    }

    fn require_token(&self) -> Result<String, CoreError> {
        self.session.token()?.ok_or(CoreError::NotSignedIn)
    }

    fn finish_account_response(
        &self,
        response: AccountResponse,
    ) -> Result<Submission<AccountOutcome>, CoreError> {
        let signed_in = match response.token.as_deref() {
            Some(token) if !token.is_empty() => {
                self.session.set_authenticated(token, response.user.as_ref())?;
                true
            }
            _ => false,
        };

        Ok(Submission::Done(AccountOutcome {
            message: response.message,
            signed_in,
            user: response.user,
        }))
    }

    /// Credential to send with a status check: the active token, else a pending one.
    fn status_token(&self) -> Option<String> {
        let active = self.session.token().unwrap_or_else(|error| {
            tracing::warn!(%error, "could not read session token");
            None
        });
        active.or_else(|| {
            self.session
                .pending_login()
                .ok()
                .flatten()
                .and_then(|pending| pending.token)
        })
    }
}

impl StatusSource for PantryBackend {
    fn check_status<'a>(
        &'a self,
        handle: &'a JobHandle,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatus, ApiError>> + Send + 'a>> {
        Box::pin(async move {
            let token = self.status_token();
            let value = match handle.kind() {
                JobKind::EmailVerification => {
                    let body = json!({ "email": handle.key() });
                    self.api
                        .post("/users/data-fetch-status-by-email", &body, None)
                        .await?
                }
                JobKind::AccountDataFetch => {
                    let path = format!(
                        "/users/data-fetch-status/{}",
                        urlencoding::encode(handle.key())
                    );
                    self.api.get(&path, token.as_deref()).await?
                }
                JobKind::DashboardAggregate => {
                    self.api
                        .get("/users/data-fetch-status", token.as_deref())
                        .await?
                }
            };
            Ok(JobStatus::from_value(value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_trend_query_encodes_parameters() {
        let query = PriceTrendQuery {
            product_id: Some(String::from("organic milk")),
            days: Some(30),
        };
        assert_eq!(
            query.to_path(),
            "/dashboard/price-trends?productId=organic%20milk&days=30"
        );
        assert_eq!(
            PriceTrendQuery::default().to_path(),
            "/dashboard/price-trends"
        );
    }

    #[test]
    fn account_response_prefers_explicit_user_id() {
        let response = AccountResponse::parse(json!({
            "status": "pending",
            "userId": 42,
            "user": {"id": "ignored"}
        }));
        assert!(response.is_pending());
        assert_eq!(response.user_id().as_deref(), Some("42"));
    }

    #[test]
    fn malformed_account_response_degrades_to_empty() {
        let response = AccountResponse::parse(json!({"user": "not-an-object"}));
        assert!(!response.is_pending());
        assert_eq!(response.user_id(), None);
    }
}
