use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::{EntityId, Priority, Recurrence, Reminder, TaskStatus, User};

// ============================================================================
// Response Envelope
// ============================================================================

/// Uniform envelope every backend endpoint answers with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    // `default` here would add a `T: Default` bound to `Deserialize`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: ResponseMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// The server's error message, or a generic one when it sent none.
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "request was not successful".to_string())
    }

    /// Return the envelope unchanged if the server reported success.
    pub fn ensure_success(self) -> Result<Self, String> {
        if self.success {
            Ok(self)
        } else {
            Err(self.error_message())
        }
    }

    /// Extract the payload of a successful response.
    pub fn into_data(self) -> Result<T, String> {
        if !self.success {
            return Err(self.error_message());
        }
        self.data
            .ok_or_else(|| "response contained no data".to_string())
    }
}

/// Pagination details attached to list responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

// ============================================================================
// Query Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl PageQuery {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ]
    }
}

// ============================================================================
// Event API Types
// ============================================================================

/// Payload for creating an event, in server field names.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewEvent {
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub is_all_day: bool,
    pub recurrence_rule: Option<Recurrence>,
    pub category_id: Option<EntityId>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,

    #[validate(custom = "validate_hex_color")]
    pub color: Option<String>,
}

/// Partial update for an event, in server field names.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct EventPatch {
    #[validate(length(min = 1, max = 500))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[validate(length(max = 5000))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_all_day: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<EntityId>,
}

// ============================================================================
// Task API Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewTask {
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub category_id: Option<EntityId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TaskPatch {
    #[validate(length(min = 1, max = 500))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[validate(length(max = 5000))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<EntityId>,
}

// ============================================================================
// Category API Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(custom = "validate_hex_color")]
    pub color: String,

    pub icon: Option<String>,

    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CategoryPatch {
    #[validate(length(min = 1, max = 100))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[validate(custom = "validate_hex_color")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================================================
// Auth API Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
}

/// Body of a successful login or registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

/// Accepts `#rgb` and `#rrggbb`.
fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    let digits = color
        .strip_prefix('#')
        .ok_or_else(|| ValidationError::new("hex_color"))?;
    let valid_len = digits.len() == 3 || digits.len() == 6;
    if valid_len && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ValidationError::new("hex_color"))
    }
}
