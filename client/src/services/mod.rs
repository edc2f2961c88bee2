//! Resource services built on [`EntityService`](crate::entity::EntityService).

pub mod categories;
pub mod events;
pub mod tasks;

pub use categories::CategoryService;
pub use events::EventService;
pub use tasks::TaskService;
