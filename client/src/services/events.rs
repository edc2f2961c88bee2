use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use daybook_shared::api::{EventPatch, NewEvent};
use daybook_shared::mapper::to_api_event;
use daybook_shared::{CalendarEvent, EntityId};

use crate::calendar::{events_in_range, month_range};
use crate::entity::EntityService;
use crate::error::{ApiError, ApiResult};
use crate::http::{ApiClient, RequestOptions};

pub const EVENTS_PATH: &str = "/events";

pub struct EventService {
    entities: EntityService<CalendarEvent>,
}

impl EventService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            entities: EntityService::new(api, EVENTS_PATH),
        }
    }

    /// Load events overlapping `[from, to)` into the mirror.
    ///
    /// The range is sent to the server and re-applied locally before the
    /// mirror is replaced, so a backend that ignores it still leaves only
    /// in-range events in the store.
    pub async fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> ApiResult<Vec<CalendarEvent>> {
        let options = RequestOptions::default()
            .query("from", from.to_rfc3339())
            .query("to", to.to_rfc3339());
        self.list_filtered(options, |events| events_in_range(&events, from, to))
            .await
    }

    pub async fn month(&self, year: i32, month: u32) -> ApiResult<Vec<CalendarEvent>> {
        let (from, to) = month_range(year, month)
            .ok_or_else(|| ApiError::InvalidRequest(format!("invalid month {}-{}", year, month)))?;
        self.between(from, to).await
    }

    pub async fn create_event(&self, event: &NewEvent) -> ApiResult<CalendarEvent> {
        self.create(event).await
    }

    pub async fn update_event(&self, id: &EntityId, patch: &EventPatch) -> ApiResult<CalendarEvent> {
        self.update(id, patch).await
    }

    /// Write back a whole edited event in the server's field names.
    pub async fn save(&self, event: &CalendarEvent) -> ApiResult<CalendarEvent> {
        self.update(&event.id, &to_api_event(event)).await
    }

    /// Mirrored events starting at or after `now`, soonest first
    pub fn upcoming(&self, now: DateTime<Utc>, limit: usize) -> Vec<CalendarEvent> {
        let mut events: Vec<CalendarEvent> = self
            .store()
            .items()
            .into_iter()
            .filter(|event| event.start >= now)
            .collect();
        events.sort_by_key(|event| event.start);
        events.truncate(limit);
        events
    }
}

impl Deref for EventService {
    type Target = EntityService<CalendarEvent>;

    fn deref(&self) -> &Self::Target {
        &self.entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Backend};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    async fn service(backend: &Backend) -> EventService {
        let url = test_support::serve(backend.router(EVENTS_PATH)).await;
        let (client, _, _) = test_support::client(&url);
        EventService::new(Arc::new(client))
    }

    fn backend() -> Backend {
        Backend::with_records(vec![
            json!({
                "id": 1, "title": "Dentist",
                "start_time": "2024-05-02T09:00:00Z", "end_time": "2024-05-02T10:00:00Z"
            }),
            json!({
                "id": 2, "title": "Conference",
                "start_time": "2024-05-30T08:00:00Z", "end_time": "2024-06-02T18:00:00Z",
                "is_all_day": true, "category_id": 5
            }),
            json!({
                "id": 3, "title": "Holiday",
                "start_time": "2024-07-10T00:00:00Z", "end_time": "2024-07-20T00:00:00Z"
            }),
        ])
    }

    #[tokio::test]
    async fn test_events_mapped_from_server_shape() {
        let service = service(&backend()).await;
        let events = service.get_all(1, 20).await.unwrap();

        let conference = &events[1];
        assert!(conference.all_day);
        assert_eq!(conference.category_id, Some(EntityId::Number(5)));
        assert_eq!(conference.start, Utc.with_ymd_and_hms(2024, 5, 30, 8, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_month_filters_locally() {
        let service = service(&backend()).await;

        let june: Vec<String> = service
            .month(2024, 6)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(june, vec!["Conference"]);
        let mirrored: Vec<String> = service.store().items().into_iter().map(|e| e.title).collect();
        assert_eq!(mirrored, june);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(service.upcoming(now, 10).len(), 1);

        assert!(matches!(
            service.month(2024, 0).await,
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_create_and_save_round_trip() {
        let backend = backend();
        let service = service(&backend).await;
        let start = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();

        let created = service
            .create_event(&NewEvent {
                title: "Lunch".to_string(),
                description: None,
                location: Some("Cafe".to_string()),
                start_time: start,
                end_time: start + Duration::hours(1),
                is_all_day: false,
                recurrence_rule: None,
                category_id: None,
                reminders: Vec::new(),
                color: Some("#f59e0b".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(created.location.as_deref(), Some("Cafe"));

        let mut edited = created.clone();
        edited.end = start + Duration::hours(2);
        edited.all_day = true;
        let saved = service.save(&edited).await.unwrap();

        assert_eq!(saved.end, start + Duration::hours(2));
        assert!(saved.all_day);
        let stored = backend.records().into_iter().find(|r| r["id"] == json!(4)).unwrap();
        assert_eq!(stored["is_all_day"], json!(true));
        assert!(stored.get("all_day").is_none());
    }

    #[tokio::test]
    async fn test_update_event_patch() {
        let service = service(&backend()).await;
        service.get_all(1, 20).await.unwrap();

        let patch = EventPatch {
            title: Some("Dentist (rescheduled)".to_string()),
            ..Default::default()
        };
        let updated = service.update_event(&EntityId::Number(1), &patch).await.unwrap();
        assert_eq!(updated.title, "Dentist (rescheduled)");
        assert_eq!(
            service.store().find(&EntityId::Number(1)).unwrap().title,
            "Dentist (rescheduled)"
        );
    }

    #[tokio::test]
    async fn test_upcoming() {
        let service = service(&backend()).await;
        service.get_all(1, 20).await.unwrap();

        let now = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        let titles: Vec<String> = service.upcoming(now, 1).into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["Conference"]);
    }
}
