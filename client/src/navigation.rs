//! Client-side navigation: where the app is, and how code outside the router
//! (the request wrapper on a 401, the privacy guard) sends it elsewhere.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use tokio::sync::watch;

/// A path plus query parameters, e.g. `/privacy-control-center?level=stealth`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NavigationTarget {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl NavigationTarget {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Split a URL like `/tasks?filter=open` into path and decoded query.
    pub fn parse(url: &str) -> Self {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, query),
            None => (url, ""),
        };

        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(key), decode(value))
            })
            .collect();

        Self {
            path: path.to_string(),
            query,
        }
    }

    pub fn to_url(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }
}

impl fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Something that can move the application to another location.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: NavigationTarget);
}

/// Locations kept by [`History`] unless another limit is given
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// In-memory navigation history. The current location is observable; only
/// the most recent `limit` locations are remembered.
pub struct History {
    current: watch::Sender<NavigationTarget>,
    visited: Mutex<VecDeque<NavigationTarget>>,
    limit: usize,
}

impl History {
    pub fn new(start: NavigationTarget) -> Self {
        Self::with_limit(start, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(start: NavigationTarget, limit: usize) -> Self {
        let (current, _) = watch::channel(start.clone());
        Self {
            current,
            visited: Mutex::new(VecDeque::from([start])),
            limit: limit.max(1),
        }
    }

    pub fn current(&self) -> NavigationTarget {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NavigationTarget> {
        self.current.subscribe()
    }

    /// Recently visited locations, oldest first.
    pub fn visited(&self) -> Vec<NavigationTarget> {
        match self.visited.lock() {
            Ok(visited) => visited.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    fn record(&self, target: NavigationTarget) {
        let mut visited = match self.visited.lock() {
            Ok(visited) => visited,
            Err(poisoned) => poisoned.into_inner(),
        };
        visited.push_back(target);
        while visited.len() > self.limit {
            visited.pop_front();
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(NavigationTarget::new("/"))
    }
}

impl Navigator for History {
    fn navigate(&self, target: NavigationTarget) {
        tracing::debug!("Navigating to {}", target);
        self.record(target.clone());
        self.current.send_replace(target);
    }
}
