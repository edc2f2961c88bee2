//! Application routes, their privacy metadata, and the router that guards them.

use std::sync::Arc;

use daybook_shared::{PrivacyContext, PrivacyLevel, RouteData};

use crate::auth::AuthService;
use crate::guard::{GuardDecision, PrivacyGuard};
use crate::navigation::{NavigationTarget, Navigator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Register,
    Calendar,
    StealthCalendar,
    Tasks,
    Categories,
    Wellness,
    Assistant,
    Analytics,
    PrivacyCenter,
    Settings,
    NotFound,
}

impl Route {
    pub const ALL: [Route; 13] = [
        Route::Home,
        Route::Login,
        Route::Register,
        Route::Calendar,
        Route::StealthCalendar,
        Route::Tasks,
        Route::Categories,
        Route::Wellness,
        Route::Assistant,
        Route::Analytics,
        Route::PrivacyCenter,
        Route::Settings,
        Route::NotFound,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Calendar => "/calendar",
            Route::StealthCalendar => "/calendar/stealth",
            Route::Tasks => "/tasks",
            Route::Categories => "/categories",
            Route::Wellness => "/wellness",
            Route::Assistant => "/assistant",
            Route::Analytics => "/analytics",
            Route::PrivacyCenter => "/privacy-control-center",
            Route::Settings => "/settings",
            Route::NotFound => "/404",
        }
    }

    pub fn target(&self) -> NavigationTarget {
        NavigationTarget::new(self.path())
    }

    /// Match a path (query string ignored) to a route.
    pub fn recognize(path: &str) -> Route {
        let path = path.split('?').next().unwrap_or(path);
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        Route::ALL
            .into_iter()
            .find(|route| route.path() == path)
            .unwrap_or(Route::NotFound)
    }

    /// Privacy requirements checked before the route is entered
    pub fn data(&self) -> RouteData {
        use PrivacyContext as Ctx;
        use PrivacyLevel as Level;

        match self {
            Route::Calendar => RouteData::protected(Level::Private, Ctx::CalendarEvents).with_off_grid(),
            Route::StealthCalendar => RouteData::protected(Level::Stealth, Ctx::CalendarEvents).with_encryption(),
            Route::Tasks => RouteData::protected(Level::Private, Ctx::Tasks).with_off_grid(),
            Route::Categories => RouteData::protected(Level::Shared, Ctx::General).with_off_grid(),
            Route::Wellness => RouteData::protected(Level::Confidential, Ctx::Wellness).with_encryption(),
            Route::Assistant => RouteData::protected(Level::Private, Ctx::Assistant),
            Route::Analytics => RouteData::protected(Level::Shared, Ctx::Analytics),
            Route::Home
            | Route::Login
            | Route::Register
            | Route::PrivacyCenter
            | Route::Settings
            | Route::NotFound => RouteData::open(),
        }
    }

    /// Whether a signed-in session is needed
    pub fn requires_auth(&self) -> bool {
        !matches!(
            self,
            Route::Home | Route::Login | Route::Register | Route::NotFound
        )
    }
}

/// Resolves URLs to routes, runs the checks, and moves the navigator.
pub struct Router {
    guard: PrivacyGuard,
    navigator: Arc<dyn Navigator>,
    auth: Option<Arc<AuthService>>,
}

impl Router {
    pub fn new(guard: PrivacyGuard, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            guard,
            navigator,
            auth: None,
        }
    }

    /// Send signed-out users to the login page for routes that need a session.
    pub fn with_auth(mut self, auth: Arc<AuthService>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Navigate to `url`, or wherever the checks redirect.
    ///
    /// A blocked navigation leaves the current location unchanged.
    pub async fn navigate(&self, url: &str) -> GuardDecision {
        let target = NavigationTarget::parse(url);
        let route = Route::recognize(&target.path);

        if let Some(auth) = &self.auth {
            if route.requires_auth() && !auth.is_authenticated() {
                let login = Route::Login.target().with_query("returnUrl", url);
                self.navigator.navigate(login.clone());
                return GuardDecision::Redirect(login);
            }
        }

        let decision = self.guard.can_activate(&route.data(), url).await;
        match &decision {
            GuardDecision::Allow => self.navigator.navigate(target),
            GuardDecision::Redirect(redirect) => {
                tracing::info!("Navigation to {} redirected to {}", url, redirect);
                self.navigator.navigate(redirect.clone());
            }
            GuardDecision::Blocked { reason } => {
                tracing::warn!("Navigation to {} blocked: {}", url, reason);
            }
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::guard::{LocalPrivacySettings, PrivacySettings};
    use crate::navigation::History;
    use crate::storage::{Storage, LOGIN_TIME_KEY, TOKEN_KEY};
    use crate::test_support;

    fn router(settings: PrivacySettings) -> (Router, Arc<History>) {
        let history = Arc::new(History::default());
        let guard = PrivacyGuard::new(Arc::new(LocalPrivacySettings::new(settings)));
        (Router::new(guard, history.clone()), history)
    }

    #[test]
    fn test_recognize() {
        assert_eq!(Route::recognize("/"), Route::Home);
        assert_eq!(Route::recognize(""), Route::Home);
        assert_eq!(Route::recognize("/tasks/"), Route::Tasks);
        assert_eq!(Route::recognize("/calendar/stealth?view=week"), Route::StealthCalendar);
        assert_eq!(Route::recognize("/nope"), Route::NotFound);

        for route in Route::ALL {
            assert_eq!(Route::recognize(route.path()), route);
        }
    }

    #[test]
    fn test_route_data() {
        assert!(Route::Login.data().is_unrestricted());
        assert!(Route::PrivacyCenter.data().is_unrestricted());
        assert!(Route::StealthCalendar.data().needs_camouflage());
        assert!(Route::Wellness.data().requires_encryption);
        assert!(!Route::Login.requires_auth());
        assert!(Route::Settings.requires_auth());
    }

    #[tokio::test]
    async fn test_open_route_navigates() {
        let (router, history) = router(PrivacySettings::default());
        let decision = router.navigate("/settings?tab=privacy").await;

        assert!(decision.is_allowed());
        assert_eq!(history.current().path, "/settings");
        assert_eq!(history.current().query_value("tab"), Some("privacy"));
    }

    #[tokio::test]
    async fn test_insufficient_clearance_redirects() {
        let (router, history) = router(PrivacySettings::default());
        router.navigate("/wellness").await;
        assert_eq!(history.current(), Route::PrivacyCenter.target());
    }

    #[tokio::test]
    async fn test_stealth_calendar_needs_every_setting() {
        let mut settings = PrivacySettings {
            clearance: PrivacyLevel::Stealth,
            encryption: true,
            ..PrivacySettings::default()
        };
        let (router_without, history) = router(settings.clone());
        router_without.navigate("/calendar/stealth").await;
        let current = history.current();
        assert_eq!(current.path, "/privacy-control-center");
        assert_eq!(current.query_value("returnUrl"), Some("/calendar/stealth"));

        settings.camouflage = true;
        let (router_with, history) = router(settings);
        assert!(router_with.navigate("/calendar/stealth").await.is_allowed());
        assert_eq!(history.current(), Route::StealthCalendar.target());
    }

    #[tokio::test]
    async fn test_signed_out_user_sent_to_login() {
        let (client, storage, _) = test_support::client("http://127.0.0.1:9");
        let auth = Arc::new(AuthService::new(Arc::new(client), &Environment::default()));
        let (router, history) = router(PrivacySettings::default());
        let router = router.with_auth(auth);

        let decision = router.navigate("/tasks").await;
        assert!(matches!(decision, GuardDecision::Redirect(_)));
        assert_eq!(history.current().path, "/login");
        assert_eq!(history.current().query_value("returnUrl"), Some("/tasks"));

        storage.set(TOKEN_KEY, "tok").unwrap();
        storage
            .set(LOGIN_TIME_KEY, &chrono::Utc::now().to_rfc3339())
            .unwrap();
        assert!(router.navigate("/tasks").await.is_allowed());
        assert_eq!(history.current().path, "/tasks");
    }
}
