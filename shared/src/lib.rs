//! Types shared between the Daybook client library and anything that speaks
//! to the same backend: entity models, the response envelope, request
//! payloads, the event mapper and the privacy vocabulary used by route guards.

pub mod api;
pub mod mapper;
pub mod models;
pub mod privacy;

pub use api::{ApiResponse, PageQuery, ResponseMeta};
pub use mapper::{from_api_event, to_api_event, ApiEvent};
pub use models::{CalendarEvent, Category, Entity, EntityId, Priority, Task, TaskStatus, User};
pub use privacy::{PrivacyContext, PrivacyLevel, RouteData};
