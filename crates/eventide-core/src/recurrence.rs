// Recurrence expansion
//
// Expands a recurring template into concrete instance slots. The arithmetic
// is deliberately calendar-unaware (months are 30 days, years are 365):
// termination-bound behavior depends on these fixed step sizes, so they are
// part of the contract rather than an approximation to fix.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::event::{Event, RecurrencePattern};

/// `{start, end}` of one generated instance, in template order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceSlot {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Expand `template` into instance slots up to an inclusive bound.
///
/// Bound precedence: `until`, else the template's `recurrence_end_date`,
/// else template start + 365 days. Returns nothing when the event is not
/// recurring or is itself a generated instance. Instances start one step
/// after the template (the template occupies its own start slot) and
/// emission stops once the next start would pass the bound.
pub fn expand(template: &Event, until: Option<DateTime<Utc>>) -> Vec<InstanceSlot> {
    if !template.is_recurring || template.parent_event.is_some() {
        return Vec::new();
    }
    let Some(pattern) = template.recurrence_pattern else {
        return Vec::new();
    };

    let bound = until
        .or(template.recurrence_end_date)
        .unwrap_or(template.start_date + Duration::days(365));
    let duration = template.end_date - template.start_date;

    let mut instances = Vec::new();
    let mut current = template.start_date;

    while current <= bound {
        let Some(step) = step_for(pattern, template.custom_recurrence.as_ref()) else {
            break;
        };
        let next = current + step;
        if next > bound {
            break;
        }
        instances.push(InstanceSlot {
            start_date: next,
            end_date: next + duration,
        });
        current = next;
    }

    instances
}

/// Step between consecutive instances; None halts expansion (unknown custom
/// unit, missing custom spec, or a spec that would not advance the cursor).
///
/// The custom spec is opaque client JSON: a non-positive interval would make
/// the loop in `expand` spin forever, and an i64-scale interval would
/// overflow the Duration arithmetic, so both halt instead.
fn step_for(pattern: RecurrencePattern, custom: Option<&Value>) -> Option<Duration> {
    match pattern {
        RecurrencePattern::Daily => Some(Duration::days(1)),
        RecurrencePattern::Weekly => Some(Duration::weeks(1)),
        RecurrencePattern::Monthly => Some(Duration::days(30)),
        RecurrencePattern::Yearly => Some(Duration::days(365)),
        RecurrencePattern::Custom => {
            let custom = custom?;
            let interval = custom.get("interval").and_then(Value::as_i64).unwrap_or(1);
            if interval <= 0 {
                return None;
            }
            let unit = custom.get("unit").and_then(Value::as_str).unwrap_or("days");
            match unit {
                "days" => Duration::try_days(interval),
                "weeks" => Duration::try_weeks(interval),
                "months" => interval.checked_mul(30).and_then(Duration::try_days),
                "years" => interval.checked_mul(365).and_then(Duration::try_days),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use uuid::Uuid;

    fn template(pattern: RecurrencePattern) -> Event {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        Event {
            id: Uuid::now_v7(),
            title: "Standup".into(),
            description: String::new(),
            start_date: start,
            end_date: start + Duration::hours(1),
            location: String::new(),
            owner_id: Uuid::now_v7(),
            created_by: Uuid::now_v7(),
            updated_by: None,
            created_at: start,
            updated_at: start,
            version: 1,
            is_latest: true,
            parent_version: None,
            is_recurring: true,
            recurrence_pattern: Some(pattern),
            recurrence_end_date: None,
            custom_recurrence: None,
            parent_event: None,
            participants: vec![],
        }
    }

    #[test]
    fn daily_expansion_emits_inclusive_bound() {
        let t = template(RecurrencePattern::Daily);
        let bound = t.start_date + Duration::days(2);

        let instances = expand(&t, Some(bound));
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].start_date, t.start_date + Duration::days(1));
        assert_eq!(instances[1].start_date, t.start_date + Duration::days(2));
        assert_eq!(instances[1].end_date, instances[1].start_date + Duration::hours(1));
    }

    #[test]
    fn non_recurring_event_expands_to_nothing() {
        let mut t = template(RecurrencePattern::Daily);
        t.is_recurring = false;
        t.recurrence_pattern = None;
        assert!(expand(&t, None).is_empty());
    }

    #[test]
    fn generated_instance_never_re_expands() {
        let mut t = template(RecurrencePattern::Daily);
        t.parent_event = Some(Uuid::now_v7());
        assert!(expand(&t, None).is_empty());
    }

    #[test]
    fn recurrence_end_date_bounds_expansion() {
        let mut t = template(RecurrencePattern::Weekly);
        t.recurrence_end_date = Some(t.start_date + Duration::weeks(3));

        let instances = expand(&t, None);
        assert_eq!(instances.len(), 3);
        assert_eq!(instances[2].start_date, t.start_date + Duration::weeks(3));
    }

    #[test]
    fn default_bound_is_one_year() {
        let t = template(RecurrencePattern::Monthly);
        // 365 / 30-day months
        assert_eq!(expand(&t, None).len(), 12);
    }

    #[test]
    fn custom_pattern_reads_interval_and_unit() {
        let mut t = template(RecurrencePattern::Custom);
        t.custom_recurrence = Some(json!({"interval": 3, "unit": "days"}));
        t.recurrence_end_date = Some(t.start_date + Duration::days(10));

        let instances = expand(&t, None);
        assert_eq!(instances.len(), 3);
        assert_eq!(instances[0].start_date, t.start_date + Duration::days(3));
        assert_eq!(instances[2].start_date, t.start_date + Duration::days(9));
    }

    #[test]
    fn unknown_custom_unit_halts_silently() {
        let mut t = template(RecurrencePattern::Custom);
        t.custom_recurrence = Some(json!({"interval": 1, "unit": "fortnights"}));
        assert!(expand(&t, None).is_empty());
    }

    #[test]
    fn missing_custom_spec_halts_silently() {
        let t = template(RecurrencePattern::Custom);
        assert!(expand(&t, None).is_empty());
    }

    #[test]
    fn non_positive_interval_halts_expansion() {
        let mut t = template(RecurrencePattern::Custom);
        t.custom_recurrence = Some(json!({"interval": 0, "unit": "days"}));
        assert!(expand(&t, None).is_empty());

        t.custom_recurrence = Some(json!({"interval": -5, "unit": "weeks"}));
        assert!(expand(&t, None).is_empty());
    }

    #[test]
    fn oversized_interval_halts_instead_of_overflowing() {
        let mut t = template(RecurrencePattern::Custom);
        t.custom_recurrence = Some(json!({"interval": i64::MAX, "unit": "months"}));
        assert!(expand(&t, None).is_empty());

        t.custom_recurrence = Some(json!({"interval": i64::MAX, "unit": "days"}));
        assert!(expand(&t, None).is_empty());
    }
}
