//! Login, registration and the locally stored session.
//!
//! The session is valid for `session_days` after login. It is checked on the
//! client only and never refreshed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use validator::Validate;

use daybook_shared::api::{AuthPayload, LoginRequest, RegisterRequest};
use daybook_shared::{ApiResponse, User};

use crate::config::Environment;
use crate::error::{ApiError, ApiResult};
use crate::http::{ApiClient, RequestOptions};
use crate::storage::{Storage, LOGIN_TIME_KEY, TOKEN_KEY, USER_KEY};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";

pub struct AuthService {
    api: Arc<ApiClient>,
    session_length: Duration,
}

impl AuthService {
    pub fn new(api: Arc<ApiClient>, environment: &Environment) -> Self {
        Self {
            api,
            session_length: Duration::days(environment.session_days),
        }
    }

    pub async fn login(&self, credentials: &LoginRequest) -> ApiResult<User> {
        credentials.validate()?;
        self.authenticate(LOGIN_PATH, credentials).await
    }

    pub async fn register(&self, details: &RegisterRequest) -> ApiResult<User> {
        details.validate()?;
        self.authenticate(REGISTER_PATH, details).await
    }

    async fn authenticate<B: serde::Serialize>(&self, path: &str, body: &B) -> ApiResult<User> {
        let response: ApiResponse<AuthPayload> = self.api.post(path, body, RequestOptions::default()).await?;
        let payload = response.into_data().map_err(ApiError::Rejected)?;

        self.store_session(&payload, Utc::now())?;
        tracing::info!("Signed in as {}", payload.user.email);
        Ok(payload.user)
    }

    fn store_session(&self, payload: &AuthPayload, at: DateTime<Utc>) -> ApiResult<()> {
        let storage = self.storage();
        storage.set(TOKEN_KEY, &payload.token)?;
        storage.set(USER_KEY, &serde_json::to_string(&payload.user)?)?;
        storage.set(LOGIN_TIME_KEY, &at.to_rfc3339())?;
        Ok(())
    }

    pub fn logout(&self) -> ApiResult<()> {
        self.storage().clear_session()?;
        tracing::info!("Signed out");
        Ok(())
    }

    pub fn token(&self) -> ApiResult<Option<String>> {
        Ok(self.storage().get(TOKEN_KEY)?)
    }

    pub fn current_user(&self) -> ApiResult<Option<User>> {
        match self.storage().get(USER_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// When the stored session lapses, if there is one.
    pub fn session_expires_at(&self) -> Option<DateTime<Utc>> {
        let login_time = self.storage().get(LOGIN_TIME_KEY).ok().flatten()?;
        let login_time = DateTime::parse_from_rfc3339(&login_time).ok()?;
        Some(login_time.with_timezone(&Utc) + self.session_length)
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        let has_token = matches!(self.storage().get(TOKEN_KEY), Ok(Some(_)));
        has_token && self.session_expires_at().map_or(false, |expires| now < expires)
    }

    fn storage(&self) -> &Arc<dyn Storage> {
        self.api.storage()
    }
}
