//! Client library for the Daybook calendar backend.
//!
//! - [`http::ApiClient`] wraps every request: bearer auth, timeouts, retries of
//!   transient failures and a flat error taxonomy ([`error::ApiError`]).
//! - [`entity::EntityService`] is generic CRUD over one resource, mirroring the
//!   latest known records in an injected [`store::EntityStore`].
//! - [`guard::PrivacyGuard`] decides whether a route may be entered, and
//!   [`routes::Router`] applies that decision to a [`navigation::Navigator`].

pub mod auth;
pub mod calendar;
pub mod config;
pub mod entity;
pub mod error;
pub mod guard;
pub mod http;
pub mod navigation;
pub mod routes;
pub mod services;
pub mod storage;
pub mod store;

#[cfg(test)]
mod test_support;

pub use auth::AuthService;
pub use config::Environment;
pub use entity::{EntityService, Resource};
pub use error::{ApiError, ApiResult};
pub use guard::{GuardDecision, GuardPolicy, LocalPrivacySettings, PrivacyChecks, PrivacyGuard};
pub use http::{ApiClient, RequestOptions, RequestPolicy};
pub use navigation::{History, NavigationTarget, Navigator};
pub use routes::{Route, Router};
pub use services::{CategoryService, EventService, TaskService};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{EntityStore, UpdateOutcome};
