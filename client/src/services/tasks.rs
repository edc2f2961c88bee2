use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use daybook_shared::api::TaskPatch;
use daybook_shared::{EntityId, Priority, Task, TaskStatus};

use crate::entity::EntityService;
use crate::error::ApiResult;
use crate::http::ApiClient;

pub const TASKS_PATH: &str = "/api/tasks";

pub struct TaskService {
    entities: EntityService<Task>,
}

impl TaskService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            entities: EntityService::new(api, TASKS_PATH),
        }
    }

    /// Flip the completed flag. Status is left alone.
    pub async fn toggle_completed(&self, id: &EntityId) -> ApiResult<Task> {
        let current = match self.store().find(id) {
            Some(task) => task,
            None => self.get_by_id(id, false).await?,
        };
        self.set_completed(id, !current.completed).await
    }

    pub async fn set_completed(&self, id: &EntityId, completed: bool) -> ApiResult<Task> {
        let patch = TaskPatch {
            completed: Some(completed),
            ..Default::default()
        };
        self.update(id, &patch).await
    }

    pub async fn set_status(&self, id: &EntityId, status: TaskStatus) -> ApiResult<Task> {
        let patch = TaskPatch {
            status: Some(status),
            ..Default::default()
        };
        self.update(id, &patch).await
    }

    /// Mirrored tasks with the given priority
    pub fn by_priority(&self, priority: Priority) -> Vec<Task> {
        self.store()
            .items()
            .into_iter()
            .filter(|task| task.priority == priority)
            .collect()
    }

    /// Mirrored open tasks past their due date, most overdue first
    pub fn overdue(&self, now: DateTime<Utc>) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .store()
            .items()
            .into_iter()
            .filter(|task| task.is_overdue(now))
            .collect();
        tasks.sort_by_key(|task| task.due_date);
        tasks
    }
}

impl Deref for TaskService {
    type Target = EntityService<Task>;

    fn deref(&self) -> &Self::Target {
        &self.entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Backend};
    use chrono::TimeZone;
    use serde_json::json;

    async fn service(backend: &Backend) -> TaskService {
        let url = test_support::serve(backend.router(TASKS_PATH)).await;
        let (client, _, _) = test_support::client(&url);
        TaskService::new(Arc::new(client))
    }

    fn backend() -> Backend {
        Backend::with_records(vec![
            json!({ "id": 1, "title": "File taxes", "priority": "high", "due_date": "2024-04-15T00:00:00Z" }),
            json!({ "id": 2, "title": "Call plumber", "priority": "high", "due_date": "2024-04-01T00:00:00Z" }),
            json!({ "id": 3, "title": "Read novel", "priority": "low" }),
            json!({ "id": 4, "title": "Pay rent", "due_date": "2024-03-01T00:00:00Z", "completed": true }),
        ])
    }

    #[tokio::test]
    async fn test_toggle_completed_leaves_status() {
        let service = service(&backend()).await;
        service.get_all(1, 20).await.unwrap();

        let toggled = service.toggle_completed(&EntityId::Number(3)).await.unwrap();
        assert!(toggled.completed);
        assert_eq!(toggled.status, TaskStatus::Todo);

        let toggled = service.toggle_completed(&EntityId::Number(3)).await.unwrap();
        assert!(!toggled.completed);
    }

    #[tokio::test]
    async fn test_toggle_fetches_when_not_mirrored() {
        let service = service(&backend()).await;
        let toggled = service.toggle_completed(&EntityId::Number(4)).await.unwrap();
        assert!(!toggled.completed);
    }

    #[tokio::test]
    async fn test_set_status() {
        let service = service(&backend()).await;
        service.get_all(1, 20).await.unwrap();

        let task = service
            .set_status(&EntityId::Number(1), TaskStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(!task.completed);
    }

    #[tokio::test]
    async fn test_filters_over_mirror() {
        let service = service(&backend()).await;
        service.get_all(1, 20).await.unwrap();

        assert_eq!(service.by_priority(Priority::High).len(), 2);
        assert_eq!(service.by_priority(Priority::Medium).len(), 1);

        let now = Utc.with_ymd_and_hms(2024, 4, 20, 0, 0, 0).unwrap();
        let titles: Vec<String> = service.overdue(now).into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["Call plumber", "File taxes"]);
    }
}
