//! Translation between the backend's event shape and [`CalendarEvent`].
//!
//! The server uses `start_time`/`end_time`/`is_all_day`/`recurrence_rule`
//! while the client model uses shorter names. Both directions are total, so
//! `to_api_event(&from_api_event(x)) == x` for every field listed here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{CalendarEvent, EntityId, Recurrence, Reminder};

/// Event record exactly as the backend serializes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ApiEvent {
    pub id: EntityId,
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_rule: Option<Recurrence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<EntityId>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

pub fn from_api_event(event: ApiEvent) -> CalendarEvent {
    CalendarEvent {
        id: event.id,
        title: event.title,
        description: event.description,
        location: event.location,
        start: event.start_time,
        end: event.end_time,
        all_day: event.is_all_day,
        recurrence: event.recurrence_rule,
        category_id: event.category_id,
        reminders: event.reminders,
        color: event.color,
        created_at: event.created_at,
        updated_at: event.updated_at,
    }
}

pub fn to_api_event(event: &CalendarEvent) -> ApiEvent {
    ApiEvent {
        id: event.id.clone(),
        title: event.title.clone(),
        description: event.description.clone(),
        location: event.location.clone(),
        start_time: event.start,
        end_time: event.end,
        is_all_day: event.all_day,
        recurrence_rule: event.recurrence.clone(),
        category_id: event.category_id.clone(),
        reminders: event.reminders.clone(),
        color: event.color.clone(),
        created_at: event.created_at,
        updated_at: event.updated_at,
    }
}

impl From<ApiEvent> for CalendarEvent {
    fn from(event: ApiEvent) -> Self {
        from_api_event(event)
    }
}

impl From<&CalendarEvent> for ApiEvent {
    fn from(event: &CalendarEvent) -> Self {
        to_api_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frequency, RecurrenceEnd, ReminderMethod};

    const SERVER_EVENT: &str = r##"{
        "id": 7,
        "title": "Standup",
        "start_time": "2024-03-04T09:00:00Z",
        "end_time": "2024-03-04T09:15:00Z",
        "is_all_day": false,
        "category_id": "cat-work",
        "recurrence_rule": {"frequency": "daily", "interval": 1, "end": {"type": "never"}},
        "reminders": [{"minutes_before": 5, "method": "notification"}],
        "color": "#10b981",
        "updated_at": "2024-03-01T08:00:00Z"
    }"##;

    #[test]
    fn test_from_api_event_renames_fields() {
        let wire: ApiEvent = serde_json::from_str(SERVER_EVENT).unwrap();
        let event = from_api_event(wire);

        assert_eq!(event.id, EntityId::Number(7));
        assert_eq!(event.start.to_rfc3339(), "2024-03-04T09:00:00+00:00");
        assert!(!event.all_day);
        assert_eq!(event.category_id, Some(EntityId::Text("cat-work".to_string())));
        assert_eq!(
            event.recurrence,
            Some(Recurrence {
                frequency: Frequency::Daily,
                interval: 1,
                end: RecurrenceEnd::Never,
            })
        );
        assert_eq!(event.reminders[0].method, ReminderMethod::Notification);
    }

    #[test]
    fn test_round_trip_preserves_server_shape() {
        let wire: ApiEvent = serde_json::from_str(SERVER_EVENT).unwrap();
        let back = to_api_event(&from_api_event(wire.clone()));
        assert_eq!(back, wire);

        let original: serde_json::Value = serde_json::from_str(SERVER_EVENT).unwrap();
        let reserialized = serde_json::to_value(&back).unwrap();
        for key in ["start_time", "end_time", "is_all_day", "category_id"] {
            assert_eq!(reserialized[key], original[key], "field {} changed", key);
        }
    }
}
