// Event domain entity
//
// An Event row is one immutable snapshot in a version lineage. Lineages are
// anchored at the version-1 root; every later version points back at the
// root via `parent_version` and exactly one row per lineage carries
// `is_latest = true`. Generated recurring instances point at their template
// via `parent_event` and are never versioned or re-expanded.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::{EventideError, Result};

/// Recurrence pattern of a template event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

impl RecurrencePattern {
    pub fn as_str(self) -> &'static str {
        match self {
            RecurrencePattern::Daily => "daily",
            RecurrencePattern::Weekly => "weekly",
            RecurrencePattern::Monthly => "monthly",
            RecurrencePattern::Yearly => "yearly",
            RecurrencePattern::Custom => "custom",
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrencePattern {
    type Err = EventideError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(RecurrencePattern::Daily),
            "weekly" => Ok(RecurrencePattern::Weekly),
            "monthly" => Ok(RecurrencePattern::Monthly),
            "yearly" => Ok(RecurrencePattern::Yearly),
            "custom" => Ok(RecurrencePattern::Custom),
            other => Err(EventideError::validation(format!(
                "unknown recurrence pattern: {other}"
            ))),
        }
    }
}

/// One versioned event snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
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
    /// Positive, starts at 1 on the lineage root
    pub version: i32,
    pub is_latest: bool,
    /// Version-1 root of this lineage; None on the root itself
    pub parent_version: Option<Uuid>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    /// Structured `{interval, unit}` spec for the custom pattern
    pub custom_recurrence: Option<Value>,
    /// Template this row was expanded from; set only on generated instances
    pub parent_event: Option<Uuid>,
    pub participants: Vec<Uuid>,
}

impl Event {
    /// Root id of this row's lineage (the row itself when it is version 1).
    pub fn root_id(&self) -> Uuid {
        self.parent_version.unwrap_or(self.id)
    }

    /// True for recurring templates that expand into instances.
    pub fn is_template(&self) -> bool {
        self.is_recurring && self.parent_event.is_none()
    }

    /// Model invariants checked before any insert.
    pub fn validate(&self) -> Result<()> {
        if self.start_date >= self.end_date {
            return Err(EventideError::validation(
                "end date must be after start date",
            ));
        }
        if self.is_recurring && self.recurrence_pattern.is_none() {
            return Err(EventideError::validation(
                "recurrence pattern is required for recurring events",
            ));
        }
        if self.parent_event.is_some() && self.is_recurring {
            return Err(EventideError::validation(
                "a generated instance cannot itself be recurring",
            ));
        }
        if self.version < 1 {
            return Err(EventideError::validation("version must be positive"));
        }
        Ok(())
    }

    /// Full field snapshot recorded in changelog entries.
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("title".into(), json!(self.title));
        data.insert("description".into(), json!(self.description));
        data.insert("start_date".into(), json!(self.start_date.to_rfc3339()));
        data.insert("end_date".into(), json!(self.end_date.to_rfc3339()));
        data.insert("location".into(), json!(self.location));
        data.insert("is_recurring".into(), json!(self.is_recurring));
        data.insert(
            "recurrence_pattern".into(),
            json!(self.recurrence_pattern.map(RecurrencePattern::as_str)),
        );
        data.insert(
            "recurrence_end_date".into(),
            json!(self.recurrence_end_date.map(|d| d.to_rfc3339())),
        );
        data.insert(
            "custom_recurrence".into(),
            self.custom_recurrence.clone().unwrap_or(Value::Null),
        );
        data.insert("version".into(), json!(self.version));
        data.insert("updated_by".into(), json!(self.updated_by));
        data
    }

    /// Snapshot of a single field, as recorded in `field_update` entries.
    pub fn field_value(&self, field: &str) -> Value {
        self.snapshot().remove(field).unwrap_or(Value::Null)
    }
}

/// Input for creating a new event (version 1 of a fresh lineage)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_pattern: Option<RecurrencePattern>,
    #[serde(default)]
    pub recurrence_end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub custom_recurrence: Option<Value>,
    #[serde(default)]
    pub participants: Vec<Uuid>,
    /// Create even when the slot conflicts with existing events
    #[serde(default)]
    pub force_create: bool,
}

/// Partial update of an event's content fields. `None` means unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub is_recurring: Option<bool>,
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    pub custom_recurrence: Option<Value>,
}

impl EventPatch {
    /// Apply the patch to `event`, returning the names of fields whose value
    /// actually changed (in declaration order). A patch that repeats current
    /// values yields an empty list and the caller treats it as a no-op.
    pub fn apply(&self, event: &mut Event) -> Vec<&'static str> {
        let mut changed = Vec::new();

        if let Some(title) = &self.title {
            if *title != event.title {
                event.title = title.clone();
                changed.push("title");
            }
        }
        if let Some(description) = &self.description {
            if *description != event.description {
                event.description = description.clone();
                changed.push("description");
            }
        }
        if let Some(start_date) = self.start_date {
            if start_date != event.start_date {
                event.start_date = start_date;
                changed.push("start_date");
            }
        }
        if let Some(end_date) = self.end_date {
            if end_date != event.end_date {
                event.end_date = end_date;
                changed.push("end_date");
            }
        }
        if let Some(location) = &self.location {
            if *location != event.location {
                event.location = location.clone();
                changed.push("location");
            }
        }
        if let Some(is_recurring) = self.is_recurring {
            if is_recurring != event.is_recurring {
                event.is_recurring = is_recurring;
                changed.push("is_recurring");
            }
        }
        if let Some(pattern) = self.recurrence_pattern {
            if Some(pattern) != event.recurrence_pattern {
                event.recurrence_pattern = Some(pattern);
                changed.push("recurrence_pattern");
            }
        }
        if let Some(end) = self.recurrence_end_date {
            if Some(end) != event.recurrence_end_date {
                event.recurrence_end_date = Some(end);
                changed.push("recurrence_end_date");
            }
        }
        if let Some(custom) = &self.custom_recurrence {
            if Some(custom) != event.custom_recurrence.as_ref() {
                event.custom_recurrence = Some(custom.clone());
                changed.push("custom_recurrence");
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_event() -> Event {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        Event {
            id: Uuid::now_v7(),
            title: "Standup".into(),
            description: "Daily sync".into(),
            start_date: start,
            end_date: start + chrono::Duration::hours(1),
            location: "Room 4".into(),
            owner_id: Uuid::now_v7(),
            created_by: Uuid::now_v7(),
            updated_by: None,
            created_at: start,
            updated_at: start,
            version: 1,
            is_latest: true,
            parent_version: None,
            is_recurring: false,
            recurrence_pattern: None,
            recurrence_end_date: None,
            custom_recurrence: None,
            parent_event: None,
            participants: vec![],
        }
    }

    #[test]
    fn validate_rejects_inverted_dates() {
        let mut event = sample_event();
        event.end_date = event.start_date - chrono::Duration::minutes(5);
        assert!(matches!(
            event.validate(),
            Err(EventideError::Validation(_))
        ));
    }

    #[test]
    fn validate_requires_pattern_for_recurring() {
        let mut event = sample_event();
        event.is_recurring = true;
        assert!(event.validate().is_err());

        event.recurrence_pattern = Some(RecurrencePattern::Weekly);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn validate_rejects_recurring_instance() {
        let mut event = sample_event();
        event.parent_event = Some(Uuid::now_v7());
        event.is_recurring = true;
        event.recurrence_pattern = Some(RecurrencePattern::Daily);
        assert!(event.validate().is_err());
    }

    #[test]
    fn root_id_falls_back_to_own_id() {
        let mut event = sample_event();
        assert_eq!(event.root_id(), event.id);

        let root = Uuid::now_v7();
        event.parent_version = Some(root);
        assert_eq!(event.root_id(), root);
    }

    #[test]
    fn patch_reports_only_real_changes() {
        let mut event = sample_event();
        let patch = EventPatch {
            title: Some("Standup".into()),    // unchanged
            location: Some("Room 5".into()),  // changed
            ..Default::default()
        };

        let changed = patch.apply(&mut event);
        assert_eq!(changed, vec!["location"]);
        assert_eq!(event.location, "Room 5");
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut event = sample_event();
        let before = event.clone();
        assert!(EventPatch::default().apply(&mut event).is_empty());
        assert_eq!(event, before);
    }

    #[test]
    fn snapshot_contains_content_fields() {
        let event = sample_event();
        let snap = event.snapshot();
        assert_eq!(snap["title"], json!("Standup"));
        assert_eq!(snap["version"], json!(1));
        assert_eq!(snap["recurrence_pattern"], Value::Null);
        assert_eq!(snap["start_date"], json!(event.start_date.to_rfc3339()));
    }
}
