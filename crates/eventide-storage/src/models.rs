// Database models (internal rows, converted to core domain types)

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

use eventide_core::{diff, ChangeType, Diff, Event, Role};

// ============================================
// Event rows
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: String,
    pub owner_id: Uuid,
    pub created_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
    pub is_latest: bool,
    pub parent_version: Option<Uuid>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<String>,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    pub custom_recurrence: Option<sqlx::types::JsonValue>,
    pub parent_event: Option<Uuid>,
}

impl EventRow {
    /// Root id of the row's lineage.
    pub fn root_id(&self) -> Uuid {
        self.parent_version.unwrap_or(self.id)
    }

    /// Convert into a domain event, attaching its participant set.
    pub fn into_event(self, participants: Vec<Uuid>) -> anyhow::Result<Event> {
        let recurrence_pattern = self
            .recurrence_pattern
            .as_deref()
            .map(str::parse)
            .transpose()
            .context("invalid recurrence_pattern in events row")?;

        Ok(Event {
            id: self.id,
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            location: self.location,
            owner_id: self.owner_id,
            created_by: self.created_by,
            updated_by: self.updated_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
            is_latest: self.is_latest,
            parent_version: self.parent_version,
            is_recurring: self.is_recurring,
            recurrence_pattern,
            recurrence_end_date: self.recurrence_end_date,
            custom_recurrence: self.custom_recurrence,
            parent_event: self.parent_event,
            participants,
        })
    }
}

// ============================================
// Permission rows
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct EventPermissionRow {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub granted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A (event, user) -> role edge with its grant audit fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPermission {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub granted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventPermission {
    /// Permission data as recorded in changelog entries.
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("user_id".into(), serde_json::json!(self.user_id));
        data.insert("role".into(), serde_json::json!(self.role.as_str()));
        data.insert("granted_by".into(), serde_json::json!(self.granted_by));
        data
    }
}

impl TryFrom<EventPermissionRow> for EventPermission {
    type Error = anyhow::Error;

    fn try_from(row: EventPermissionRow) -> anyhow::Result<Self> {
        let role = row
            .role
            .parse()
            .context("invalid role in event_permissions row")?;
        Ok(EventPermission {
            id: row.id,
            event_id: row.event_id,
            user_id: row.user_id,
            role,
            granted_by: row.granted_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================
// Changelog rows
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct ChangeLogRow {
    pub id: Uuid,
    pub event_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub change_type: String,
    pub previous_data: Option<sqlx::types::JsonValue>,
    pub new_data: Option<sqlx::types::JsonValue>,
    pub old_version_id: Option<Uuid>,
    pub new_version_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// One immutable audit record of a single mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub id: Uuid,
    pub event_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub change_type: ChangeType,
    pub previous_data: Option<Map<String, Value>>,
    pub new_data: Option<Map<String, Value>>,
    pub old_version_id: Option<Uuid>,
    pub new_version_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ChangeLogEntry {
    /// Field-level diff of this entry's snapshots. Empty when either side is
    /// missing (create and delete entries record only one side).
    pub fn diff(&self) -> Diff {
        match (&self.previous_data, &self.new_data) {
            (Some(previous), Some(new)) => diff(previous, new),
            _ => Diff::new(),
        }
    }
}

impl TryFrom<ChangeLogRow> for ChangeLogEntry {
    type Error = anyhow::Error;

    fn try_from(row: ChangeLogRow) -> anyhow::Result<Self> {
        let change_type = row
            .change_type
            .parse()
            .context("invalid change_type in event_changelog row")?;
        Ok(ChangeLogEntry {
            id: row.id,
            event_id: row.event_id,
            user_id: row.user_id,
            change_type,
            previous_data: as_object(row.previous_data),
            new_data: as_object(row.new_data),
            old_version_id: row.old_version_id,
            new_version_id: row.new_version_id,
            created_at: row.created_at,
        })
    }
}

fn as_object(value: Option<Value>) -> Option<Map<String, Value>> {
    match value {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    }
}

// ============================================
// Query inputs
// ============================================

/// Filters for the event list query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl EventFilter {
    pub const DEFAULT_PAGE_SIZE: i64 = 10;
    pub const MAX_PAGE_SIZE: i64 = 100;

    pub fn limit(&self) -> i64 {
        self.page_size
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .clamp(1, Self::MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        let page = self.page.unwrap_or(1).max(1);
        (page - 1) * self.limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_diff_is_empty_without_both_sides() {
        let entry = ChangeLogEntry {
            id: Uuid::now_v7(),
            event_id: None,
            user_id: None,
            change_type: ChangeType::Create,
            previous_data: None,
            new_data: Some(Map::new()),
            old_version_id: None,
            new_version_id: None,
            created_at: Utc::now(),
        };
        assert!(entry.diff().is_empty());
    }

    #[test]
    fn non_object_payloads_convert_to_none() {
        assert!(as_object(Some(json!("not a map"))).is_none());
        assert!(as_object(None).is_none());
        assert!(as_object(Some(json!({"a": 1}))).is_some());
    }

    #[test]
    fn filter_clamps_page_size_and_offset() {
        let filter = EventFilter {
            page: Some(3),
            page_size: Some(500),
            ..Default::default()
        };
        assert_eq!(filter.limit(), EventFilter::MAX_PAGE_SIZE);
        assert_eq!(filter.offset(), 2 * EventFilter::MAX_PAGE_SIZE);

        let default = EventFilter::default();
        assert_eq!(default.limit(), EventFilter::DEFAULT_PAGE_SIZE);
        assert_eq!(default.offset(), 0);
    }
}
