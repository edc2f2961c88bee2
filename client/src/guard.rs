//! Privacy guard evaluated before entering a protected route.
//!
//! Checks run against a [`PrivacyChecks`] collaborator. Any collaborator
//! error, and a chain that exceeds [`GuardPolicy::timeout`], blocks the
//! navigation unless the guard was built with [`GuardPolicy::fail_open`].

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use daybook_shared::{PrivacyContext, PrivacyLevel, RouteData};

use crate::navigation::NavigationTarget;
use crate::routes::Route;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("privacy settings unavailable: {0}")]
    Unavailable(String),

    #[error("privacy check timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of truth for the user's privacy settings.
#[async_trait]
pub trait PrivacyChecks: Send + Sync {
    /// Whether the user's settings allow `level` content in `context`.
    async fn check_access(&self, level: PrivacyLevel, context: PrivacyContext) -> Result<bool, GuardError>;

    async fn encryption_enabled(&self) -> Result<bool, GuardError>;

    async fn off_grid_active(&self) -> Result<bool, GuardError>;

    async fn camouflage_enabled(&self) -> Result<bool, GuardError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacySettings {
    /// Most sensitive level the user has unlocked
    pub clearance: PrivacyLevel,
    /// Contexts the user has locked regardless of clearance
    #[serde(default)]
    pub locked: Vec<PrivacyContext>,
    #[serde(default)]
    pub encryption: bool,
    #[serde(default)]
    pub off_grid: bool,
    #[serde(default)]
    pub camouflage: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            clearance: PrivacyLevel::Private,
            locked: Vec::new(),
            encryption: false,
            off_grid: false,
            camouflage: false,
        }
    }
}

/// Settings held in memory, e.g. loaded from the settings page or a file.
#[derive(Default)]
pub struct LocalPrivacySettings {
    settings: RwLock<PrivacySettings>,
}

impl LocalPrivacySettings {
    pub fn new(settings: PrivacySettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub fn update(&self, change: impl FnOnce(&mut PrivacySettings)) -> Result<(), GuardError> {
        let mut settings = self
            .settings
            .write()
            .map_err(|_| GuardError::Unavailable("settings lock poisoned".to_string()))?;
        change(&mut settings);
        Ok(())
    }

    fn read<R>(&self, f: impl FnOnce(&PrivacySettings) -> R) -> Result<R, GuardError> {
        let settings = self
            .settings
            .read()
            .map_err(|_| GuardError::Unavailable("settings lock poisoned".to_string()))?;
        Ok(f(&settings))
    }
}

#[async_trait]
impl PrivacyChecks for LocalPrivacySettings {
    async fn check_access(&self, level: PrivacyLevel, context: PrivacyContext) -> Result<bool, GuardError> {
        self.read(|s| level <= s.clearance && !s.locked.contains(&context))
    }

    async fn encryption_enabled(&self) -> Result<bool, GuardError> {
        self.read(|s| s.encryption)
    }

    async fn off_grid_active(&self) -> Result<bool, GuardError> {
        self.read(|s| s.off_grid)
    }

    async fn camouflage_enabled(&self) -> Result<bool, GuardError> {
        self.read(|s| s.camouflage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardPolicy {
    /// Allow navigation when a check errors or times out
    pub fail_open: bool,
    /// Bound on the whole check chain
    pub timeout: Duration,
}

impl GuardPolicy {
    pub fn fail_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            fail_open: false,
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(NavigationTarget),
    /// A check could not be completed
    Blocked { reason: String },
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

pub struct PrivacyGuard {
    checks: Arc<dyn PrivacyChecks>,
    policy: GuardPolicy,
}

impl PrivacyGuard {
    pub fn new(checks: Arc<dyn PrivacyChecks>) -> Self {
        Self::with_policy(checks, GuardPolicy::default())
    }

    pub fn with_policy(checks: Arc<dyn PrivacyChecks>, policy: GuardPolicy) -> Self {
        Self { checks, policy }
    }

    pub fn policy(&self) -> GuardPolicy {
        self.policy
    }

    /// Decide whether navigation to a route with `data` may proceed.
    ///
    /// `return_url` is where the privacy control center should send the user
    /// once the missing settings are enabled.
    pub async fn can_activate(&self, data: &RouteData, return_url: &str) -> GuardDecision {
        if data.is_unrestricted() {
            return GuardDecision::Allow;
        }

        match tokio::time::timeout(self.policy.timeout, self.evaluate(data, return_url)).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => self.on_failure(e),
            Err(_) => self.on_failure(GuardError::Timeout(self.policy.timeout)),
        }
    }

    async fn evaluate(&self, data: &RouteData, return_url: &str) -> Result<GuardDecision, GuardError> {
        if let Some(level) = data.privacy_level {
            match self.checks.check_access(level, data.context).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!("Access to {} content in {} denied", level, data.context);
                    return Ok(GuardDecision::Redirect(Route::PrivacyCenter.target()));
                }
                Err(e) if self.policy.fail_open => {
                    tracing::warn!("Access check failed, allowing navigation: {}", e);
                    return Ok(GuardDecision::Allow);
                }
                Err(e) => return Err(e),
            }
        }

        let mut checks: Vec<BoxFuture<'_, Result<bool, GuardError>>> = Vec::new();
        if data.requires_encryption {
            checks.push(self.checks.encryption_enabled().boxed());
        }
        if !data.allow_off_grid {
            let checks_ref = &self.checks;
            checks.push(async move { checks_ref.off_grid_active().await.map(|active| !active) }.boxed());
        }
        if data.needs_camouflage() {
            checks.push(self.checks.camouflage_enabled().boxed());
        }

        let mut passed = true;
        for result in join_all(checks).await {
            match result {
                Ok(ok) => passed &= ok,
                Err(e) if self.policy.fail_open => {
                    tracing::warn!("Privacy check failed, treating as passed: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        if passed {
            return Ok(GuardDecision::Allow);
        }

        let mut target = Route::PrivacyCenter.target();
        if let Some(level) = data.privacy_level {
            target = target.with_query("level", level.as_str());
        }
        target = target
            .with_query("context", data.context.as_str())
            .with_query("returnUrl", return_url);
        Ok(GuardDecision::Redirect(target))
    }

    fn on_failure(&self, error: GuardError) -> GuardDecision {
        if self.policy.fail_open {
            tracing::warn!("Privacy guard failed open: {}", error);
            GuardDecision::Allow
        } else {
            tracing::error!("Privacy guard blocked navigation: {}", error);
            GuardDecision::Blocked {
                reason: error.to_string(),
            }
        }
    }
}
