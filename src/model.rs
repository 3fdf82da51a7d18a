use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One configured Notion database plus the page that receives its reminders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRecord {
    pub source_id: String,
    pub display_name: String,
    /// Database queried for unchecked items.
    pub database_id: String,
    /// Page the reminder comment is posted to.
    pub page_id: String,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SourceRecord {
    /// Build a new active source with a freshly generated id.
    pub fn create_new(
        display_name: impl Into<String>,
        database_id: impl Into<String>,
        page_id: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            source_id: Uuid::new_v4().to_string(),
            display_name: display_name.into(),
            database_id: database_id.into(),
            page_id: page_id.into(),
            is_active: true,
            description,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShoppingItem {
    pub id: String,
    pub name: String,
    pub checked: bool,
}

/// Aggregated result of one reminder run.
///
/// `success == true` together with `error == Some(_)` means partial success:
/// at least one source was notified and at least one failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    pub fn with_error(success: bool, message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_partial(&self) -> bool {
        self.success && self.error.is_some()
    }
}
