// Changelog diff computation
//
// Changelog rows store opaque before/after snapshots; the diff below is the
// canonical field-level comparison used both for single entries and for
// aggregating a span of entries between two versions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EventideError;

/// Kind of mutation a changelog row records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
    PermissionAdd,
    PermissionUpdate,
    PermissionDelete,
    FieldUpdate,
    Rollback,
    Share,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Create => "create",
            ChangeType::Update => "update",
            ChangeType::Delete => "delete",
            ChangeType::PermissionAdd => "permission_add",
            ChangeType::PermissionUpdate => "permission_update",
            ChangeType::PermissionDelete => "permission_delete",
            ChangeType::FieldUpdate => "field_update",
            ChangeType::Rollback => "rollback",
            ChangeType::Share => "share",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = EventideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(ChangeType::Create),
            "update" => Ok(ChangeType::Update),
            "delete" => Ok(ChangeType::Delete),
            "permission_add" => Ok(ChangeType::PermissionAdd),
            "permission_update" => Ok(ChangeType::PermissionUpdate),
            "permission_delete" => Ok(ChangeType::PermissionDelete),
            "field_update" => Ok(ChangeType::FieldUpdate),
            "rollback" => Ok(ChangeType::Rollback),
            "share" => Ok(ChangeType::Share),
            other => Err(EventideError::validation(format!(
                "unknown change type: {other}"
            ))),
        }
    }
}

/// Old and new value of a single changed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Field name -> change, ordered for stable serialization
pub type Diff = BTreeMap<String, FieldChange>;

/// Field-level difference between two snapshots.
///
/// Takes the union of both key sets; a field appears iff its values differ
/// (value equality — a null on one side is always a difference from a
/// non-null on the other). Missing keys compare as null.
pub fn diff(previous: &Map<String, Value>, new: &Map<String, Value>) -> Diff {
    let mut out = Diff::new();
    let keys = previous.keys().chain(new.keys());

    for key in keys {
        if out.contains_key(key) {
            continue;
        }
        let old_value = previous.get(key).cloned().unwrap_or(Value::Null);
        let new_value = new.get(key).cloned().unwrap_or(Value::Null);
        if old_value != new_value {
            out.insert(
                key.clone(),
                FieldChange {
                    old: old_value,
                    new: new_value,
                },
            );
        }
    }

    out
}

/// Fold an ordered sequence of diffs into one.
///
/// For each field touched anywhere in the sequence, the aggregated `old` is
/// the first occurrence's old value and the aggregated `new` is the last
/// occurrence's new value. The input must already be ordered oldest-first.
pub fn aggregate_diffs<I>(diffs: I) -> Diff
where
    I: IntoIterator<Item = Diff>,
{
    let mut out = Diff::new();
    for diff in diffs {
        for (field, change) in diff {
            match out.get_mut(&field) {
                Some(existing) => existing.new = change.new,
                None => {
                    out.insert(field, change);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn diff_of_identical_snapshots_is_empty() {
        let data = map(json!({"title": "A", "version": 2, "location": null}));
        assert!(diff(&data, &data).is_empty());
    }

    #[test]
    fn diff_keys_are_bounded_by_key_union() {
        let old = map(json!({"title": "A", "location": "x"}));
        let new = map(json!({"title": "B", "description": "d"}));
        let d = diff(&old, &new);

        for key in d.keys() {
            assert!(old.contains_key(key) || new.contains_key(key));
        }
        assert_eq!(
            d.keys().collect::<Vec<_>>(),
            vec!["description", "location", "title"]
        );
    }

    #[test]
    fn diff_treats_null_as_distinct_from_any_value() {
        let old = map(json!({"location": null}));
        let new = map(json!({"location": "Room 4"}));
        let d = diff(&old, &new);
        assert_eq!(d["location"].old, Value::Null);
        assert_eq!(d["location"].new, json!("Room 4"));
    }

    #[test]
    fn diff_fields_are_symmetric_under_swap() {
        let a = map(json!({"title": "A", "version": 1}));
        let b = map(json!({"title": "B", "version": 1}));
        let forward = diff(&a, &b);
        let backward = diff(&b, &a);

        assert_eq!(
            forward.keys().collect::<Vec<_>>(),
            backward.keys().collect::<Vec<_>>()
        );
        assert_eq!(forward["title"].old, backward["title"].new);
        assert_eq!(forward["title"].new, backward["title"].old);
    }

    #[test]
    fn aggregate_keeps_first_old_and_last_new() {
        let first = diff(
            &map(json!({"title": "A", "location": "x"})),
            &map(json!({"title": "B", "location": "x"})),
        );
        let second = diff(
            &map(json!({"title": "B", "location": "x"})),
            &map(json!({"title": "C", "location": "y"})),
        );

        let agg = aggregate_diffs([first, second]);
        assert_eq!(agg["title"].old, json!("A"));
        assert_eq!(agg["title"].new, json!("C"));
        assert_eq!(agg["location"].old, json!("x"));
        assert_eq!(agg["location"].new, json!("y"));
    }

    #[test]
    fn aggregate_of_nothing_is_empty() {
        assert!(aggregate_diffs(std::iter::empty()).is_empty());
    }

    #[test]
    fn change_type_round_trips_through_str() {
        for ct in [
            ChangeType::Create,
            ChangeType::Update,
            ChangeType::Delete,
            ChangeType::PermissionAdd,
            ChangeType::PermissionUpdate,
            ChangeType::PermissionDelete,
            ChangeType::FieldUpdate,
            ChangeType::Rollback,
            ChangeType::Share,
        ] {
            assert_eq!(ct.as_str().parse::<ChangeType>().unwrap(), ct);
        }
    }
}
