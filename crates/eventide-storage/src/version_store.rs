// Version chain operations
//
// A lineage is a singly-branching chain anchored at its version-1 root.
// Superseding is a single atomic step: the is_latest flip on the old row and
// the insert of the new row always happen inside the caller's transaction,
// so the one-latest-per-lineage invariant cannot be observed broken.

use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use eventide_core::{Actor, Event, EventideError, Result};

use crate::repositories;

/// Build the successor row of `latest`: a content copy with a fresh id,
/// `version + 1`, `is_latest = true`, `parent_version` pointing at the
/// lineage root and `updated_by` stamped with the acting user. Pure; the
/// caller persists it and flips the superseded row in the same transaction.
pub fn next_version(latest: &Event, actor: Actor) -> Event {
    let now = Utc::now();
    Event {
        id: Uuid::now_v7(),
        title: latest.title.clone(),
        description: latest.description.clone(),
        start_date: latest.start_date,
        end_date: latest.end_date,
        location: latest.location.clone(),
        owner_id: latest.owner_id,
        created_by: latest.created_by,
        updated_by: Some(actor.id),
        created_at: now,
        updated_at: now,
        version: latest.version + 1,
        is_latest: true,
        parent_version: Some(latest.root_id()),
        is_recurring: latest.is_recurring,
        recurrence_pattern: latest.recurrence_pattern,
        recurrence_end_date: latest.recurrence_end_date,
        custom_recurrence: latest.custom_recurrence.clone(),
        parent_event: None,
        participants: latest.participants.clone(),
    }
}

/// Copy the content fields of `target` onto `event`, leaving the chain
/// fields (id, version, is_latest, parent_version) untouched.
pub fn restore_content(event: &mut Event, target: &Event) {
    event.title = target.title.clone();
    event.description = target.description.clone();
    event.start_date = target.start_date;
    event.end_date = target.end_date;
    event.location = target.location.clone();
    event.is_recurring = target.is_recurring;
    event.recurrence_pattern = target.recurrence_pattern;
    event.recurrence_end_date = target.recurrence_end_date;
    event.custom_recurrence = target.custom_recurrence.clone();
}

/// Append a new version to the lineage of `latest`.
///
/// Permissions are re-copied from the root so sharing persists across
/// versions; participants travel with the new row for the same reason.
/// Fails with `NotLatest` when called on a superseded row.
pub async fn create_version(
    conn: &mut PgConnection,
    latest: &Event,
    actor: Actor,
) -> Result<Event> {
    if !latest.is_latest {
        return Err(EventideError::NotLatest);
    }

    let root = latest.root_id();
    repositories::mark_superseded(conn, latest.id).await?;

    let new_version = next_version(latest, actor);
    repositories::insert_event(conn, &new_version).await?;
    repositories::insert_participants(conn, new_version.id, &new_version.participants).await?;

    // Copy permissions from the root so the new version stays shared.
    for permission in repositories::list_permissions(conn, root).await? {
        repositories::insert_permission(
            conn,
            new_version.id,
            permission.user_id,
            &permission.role,
            permission.granted_by,
        )
        .await?;
    }

    Ok(new_version)
}

/// Roll the lineage back to `target_version` by appending a new version that
/// carries the target's content fields. The chain itself stays append-only;
/// nothing is rewritten.
pub async fn rollback(
    conn: &mut PgConnection,
    latest: &Event,
    target_version: i32,
    actor: Actor,
) -> Result<Event> {
    let root = latest.root_id();

    let target = repositories::find_version(conn, root, target_version)
        .await?
        .ok_or(EventideError::version_not_found(root, target_version))?;
    let target = {
        let participants = repositories::get_participants(conn, target.id).await?;
        target.into_event(participants)?
    };

    let mut new_version = create_version(conn, latest, actor).await?;
    restore_content(&mut new_version, &target);
    repositories::update_content(conn, &new_version).await?;

    Ok(new_version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn root_event() -> Event {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        Event {
            id: Uuid::now_v7(),
            title: "Planning".into(),
            description: "Q2 planning".into(),
            start_date: start,
            end_date: start + chrono::Duration::hours(2),
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
            participants: vec![Uuid::now_v7()],
        }
    }

    #[test]
    fn next_version_increments_and_points_at_root() {
        let root = root_event();
        let actor = Actor::new(Uuid::now_v7());

        let v2 = next_version(&root, actor);
        assert_eq!(v2.version, 2);
        assert!(v2.is_latest);
        assert_eq!(v2.parent_version, Some(root.id));
        assert_ne!(v2.id, root.id);
        assert_eq!(v2.updated_by, Some(actor.id));

        // Later versions keep pointing at the same root, not at each other.
        let v3 = next_version(&v2, actor);
        assert_eq!(v3.version, 3);
        assert_eq!(v3.parent_version, Some(root.id));
    }

    #[test]
    fn next_version_copies_content_and_participants() {
        let root = root_event();
        let v2 = next_version(&root, Actor::new(Uuid::now_v7()));

        assert_eq!(v2.title, root.title);
        assert_eq!(v2.description, root.description);
        assert_eq!(v2.start_date, root.start_date);
        assert_eq!(v2.end_date, root.end_date);
        assert_eq!(v2.location, root.location);
        assert_eq!(v2.participants, root.participants);
        assert_eq!(v2.owner_id, root.owner_id);
        assert_eq!(v2.parent_event, None);
    }

    #[test]
    fn supersede_leaves_exactly_one_latest() {
        let mut root = root_event();
        let actor = Actor::new(Uuid::now_v7());

        let mut v2 = next_version(&root, actor);
        root.is_latest = false; // mark_superseded's flip
        let v3 = next_version(&v2, actor);
        v2.is_latest = false;

        let chain = [&root, &v2, &v3];
        assert_eq!(chain.iter().filter(|e| e.is_latest).count(), 1);
        assert!(v3.is_latest);
    }

    #[test]
    fn rollback_restores_root_content_while_incrementing_version() {
        let root = root_event();
        let actor = Actor::new(Uuid::now_v7());

        // v2 changed the title and location.
        let mut v2 = next_version(&root, actor);
        v2.title = "Replanning".into();
        v2.location = "Room 9".into();

        // Rolling back to v1 appends v3 carrying v1's content.
        let mut v3 = next_version(&v2, actor);
        restore_content(&mut v3, &root);

        assert_eq!(v3.version, 3);
        assert_eq!(v3.title, root.title);
        assert_eq!(v3.location, root.location);
        assert!(v3.is_latest);
        assert_eq!(v3.parent_version, Some(root.id));
    }

    #[test]
    fn restore_content_keeps_chain_fields() {
        let root = root_event();
        let mut target = root.clone();
        target.title = "Old title".into();
        target.is_recurring = true;
        target.recurrence_pattern = Some(eventide_core::RecurrencePattern::Weekly);
        target.custom_recurrence = Some(json!({"interval": 2, "unit": "days"}));

        let mut v2 = next_version(&root, Actor::new(Uuid::now_v7()));
        let (id, version, parent) = (v2.id, v2.version, v2.parent_version);
        restore_content(&mut v2, &target);

        assert_eq!(v2.title, "Old title");
        assert!(v2.is_recurring);
        assert_eq!(v2.custom_recurrence, target.custom_recurrence);
        assert_eq!(v2.id, id);
        assert_eq!(v2.version, version);
        assert_eq!(v2.parent_version, parent);
        assert!(v2.is_latest);
    }

    #[test]
    fn update_on_v2_yields_v3_with_changed_fields() {
        let root = root_event();
        let actor = Actor::new(Uuid::now_v7());
        let mut v2 = next_version(&root, actor);
        v2.title = "Replanning".into();

        let patch = eventide_core::EventPatch {
            location: Some("Room 9".into()),
            ..Default::default()
        };
        let mut v3 = next_version(&v2, actor);
        let changed = patch.apply(&mut v3);

        assert_eq!(v3.version, 3);
        assert_eq!(changed, vec!["location"]);
        assert_eq!(v3.title, "Replanning");
        assert_eq!(v3.location, "Room 9");
        assert!(v3.is_latest);
    }
}
