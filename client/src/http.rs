//! Generic request wrapper around `reqwest`.
//!
//! Every call goes through [`ApiClient::request`], which attaches the bearer
//! token, bounds each attempt with a timeout, retries transient failures once
//! and maps HTTP failures onto [`ApiError`]. A 401 wipes the stored session
//! and sends the navigator to the login route before the error is returned.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use daybook_shared::ApiResponse;

use crate::config::Environment;
use crate::error::{ApiError, ApiResult};
use crate::navigation::Navigator;
use crate::routes::Route;
use crate::storage::{Storage, TOKEN_KEY};

/// Paths that must never carry a bearer token
const UNAUTHENTICATED_PATHS: [&str; 2] = ["/auth/login", "/auth/register"];

/// Per-call extras
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Timeout and retry behaviour shared by every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPolicy {
    pub timeout: Duration,
    /// Extra attempts after the first failure
    pub retries: u32,
    pub retry_delay: Duration,
    /// Also retry POST and PATCH, which may double-submit
    pub retry_non_idempotent: bool,
}

impl RequestPolicy {
    pub fn from_environment(environment: &Environment) -> Self {
        Self {
            timeout: environment.request_timeout(),
            retries: environment.retry_attempts,
            retry_delay: environment.retry_delay(),
            retry_non_idempotent: environment.retry_non_idempotent,
        }
    }

    fn should_retry(&self, method: &Method, error: &ApiError) -> bool {
        error.is_transient() && (is_idempotent(method) || self.retry_non_idempotent)
    }
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self::from_environment(&Environment::default())
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
    )
}

/// Exact match on the path, ignoring any query string and trailing slash.
fn is_unauthenticated_path(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    let path = path.trim_end_matches('/');
    UNAUTHENTICATED_PATHS.contains(&path)
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    storage: Arc<dyn Storage>,
    navigator: Arc<dyn Navigator>,
    policy: RequestPolicy,
}

impl ApiClient {
    pub fn new(
        environment: &Environment,
        storage: Arc<dyn Storage>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: environment.api_url.trim_end_matches('/').to_string(),
            storage,
            navigator,
            policy: RequestPolicy::from_environment(environment),
        }
    }

    pub fn with_policy(mut self, policy: RequestPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ApiResult<ApiResponse<T>> {
        self.request(Method::GET, path, None, options).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> ApiResult<ApiResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(body), options).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> ApiResult<ApiResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(body), options).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> ApiResult<ApiResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::PATCH, path, Some(body), options).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ApiResult<ApiResponse<T>> {
        self.request(Method::DELETE, path, None, options).await
    }

    /// Issue a request, retrying transient failures according to the policy.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> ApiResult<ApiResponse<T>> {
        let mut attempt = 0;
        loop {
            match self.send_once(&method, path, body.as_ref(), &options).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.policy.retries && self.policy.should_retry(&method, &e) => {
                    attempt += 1;
                    tracing::warn!(
                        "{} {} failed ({}), retrying in {:?} (attempt {}/{})",
                        method,
                        path,
                        e,
                        self.policy.retry_delay,
                        attempt,
                        self.policy.retries
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
                Err(e) => {
                    tracing::error!("{} {} failed: {}", method, path, e);
                    return Err(e);
                }
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
        options: &RequestOptions,
    ) -> ApiResult<ApiResponse<T>> {
        let request_id = Uuid::new_v4();
        let url = format!("{}{}", self.base_url, path);

        let mut builder = self
            .http
            .request(method.clone(), &url)
            .header("X-Request-Id", request_id.to_string());

        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !is_unauthenticated_path(path) {
            if let Some(token) = self.storage.get(TOKEN_KEY)? {
                builder = builder.bearer_auth(token);
            }
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        tracing::debug!("{} {} (request {})", method, url, request_id);

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, text) = match tokio::time::timeout(self.policy.timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ApiError::Connection(format!(
                    "request timed out after {:?}",
                    self.policy.timeout
                )))
            }
        };

        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized(path);
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let message = if status == StatusCode::NOT_FOUND {
                path.to_string()
            } else {
                error_message(status, &text)
            };
            return Err(ApiError::from_status(status, message));
        }

        if text.trim().is_empty() {
            return Ok(ApiResponse {
                success: true,
                data: None,
                error: None,
                meta: None,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn handle_unauthorized(&self, path: &str) {
        tracing::warn!("{} returned 401, clearing stored session", path);
        if let Err(e) = self.storage.clear_session() {
            tracing::error!("Failed to clear session after 401: {}", e);
        }
        self.navigator.navigate(Route::Login.target());
    }
}

/// Prefer the envelope's `error` field, fall back to the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        })
}
