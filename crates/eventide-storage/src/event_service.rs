// Transactional event orchestration
//
// Single entry point composing permission checks, conflict detection,
// recurrence expansion, version-chain mutation and changelog appends. Every
// mutating operation runs inside one transaction holding a row lock on the
// target event: either every write commits or none does, so the changelog
// and version chain can never diverge. The realtime publish runs after the
// commit and is fire-and-forget.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde_json::{json, Map, Value};
use sqlx::PgConnection;
use uuid::Uuid;

use eventide_core::{
    expand, suggest_slots, Action, Actor, ChangeType, ConflictingEvent, Diff, Event, EventDraft,
    EventPatch, EventideError, Interval, RealtimeSink, Result, Role, MAX_SLOT_PROBES,
    SUGGESTION_COUNT,
};

use crate::models::{ChangeLogEntry, EventFilter, EventPermission, EventRow};
use crate::repositories::{self, Database};
use crate::version_store;

#[derive(Clone)]
pub struct EventService {
    db: Database,
    sink: Option<Arc<dyn RealtimeSink>>,
}

impl EventService {
    pub fn new(db: Database) -> Self {
        Self { db, sink: None }
    }

    pub fn with_sink(db: Database, sink: Arc<dyn RealtimeSink>) -> Self {
        Self {
            db,
            sink: Some(sink),
        }
    }

    // ============================================
    // Create
    // ============================================

    /// Create a new event lineage (version 1, owner = actor).
    ///
    /// Rejects with a structured `Conflict` (conflicting events plus three
    /// alternative slots) when the requested window overlaps existing events
    /// and `force_create` is not set. Recurring templates are expanded and
    /// their instances persisted in the same transaction.
    pub async fn create(&self, draft: EventDraft, actor: Actor) -> Result<Event> {
        let mut tx = self.db.begin().await?;
        let event = Self::create_inner(&mut tx, draft, actor).await?;
        tx.commit().await.context("failed to commit transaction")?;

        tracing::info!(event_id = %event.id, user_id = %actor.id, "event created");
        self.publish(&event, "created").await;
        Ok(event)
    }

    /// Create several events inside one outer transaction; a single failure
    /// rolls back the entire batch.
    pub async fn batch_create(&self, drafts: Vec<EventDraft>, actor: Actor) -> Result<Vec<Event>> {
        let mut tx = self.db.begin().await?;
        let mut events = Vec::with_capacity(drafts.len());
        for draft in drafts {
            events.push(Self::create_inner(&mut tx, draft, actor).await?);
        }
        tx.commit().await.context("failed to commit transaction")?;

        tracing::info!(count = events.len(), user_id = %actor.id, "batch created");
        for event in &events {
            self.publish(event, "created").await;
        }
        Ok(events)
    }

    async fn create_inner(
        conn: &mut PgConnection,
        draft: EventDraft,
        actor: Actor,
    ) -> Result<Event> {
        if draft.start_date >= draft.end_date {
            return Err(EventideError::validation(
                "end date must be after start date",
            ));
        }

        let candidate = Interval::new(draft.start_date, draft.end_date);
        let conflicts =
            repositories::find_conflicts(conn, &candidate, None, &draft.participants).await?;
        if !conflicts.is_empty() && !draft.force_create {
            let suggestions = Self::suggest_for(conn, &candidate).await?;
            let conflicts = conflicts.iter().map(conflict_summary).collect();
            return Err(EventideError::Conflict {
                conflicts,
                suggestions,
            });
        }

        let now = Utc::now();
        let event = Event {
            id: Uuid::now_v7(),
            title: draft.title,
            description: draft.description,
            start_date: draft.start_date,
            end_date: draft.end_date,
            location: draft.location,
            owner_id: actor.id,
            created_by: actor.id,
            updated_by: Some(actor.id),
            created_at: now,
            updated_at: now,
            version: 1,
            is_latest: true,
            parent_version: None,
            is_recurring: draft.is_recurring,
            recurrence_pattern: draft.recurrence_pattern,
            recurrence_end_date: draft.recurrence_end_date,
            custom_recurrence: draft.custom_recurrence,
            parent_event: None,
            participants: draft.participants,
        };
        event.validate()?;

        repositories::insert_event(conn, &event).await?;
        repositories::insert_participants(conn, event.id, &event.participants).await?;
        let owner = repositories::insert_permission(
            conn,
            event.id,
            actor.id,
            Role::Owner.as_str(),
            Some(actor.id),
        )
        .await?;
        let owner = EventPermission::try_from(owner)?;

        record(
            conn,
            event.id,
            actor,
            ChangeType::Create,
            None,
            Some(event.snapshot()),
            None,
            Some(event.id),
        )
        .await?;
        record(
            conn,
            event.id,
            actor,
            ChangeType::PermissionAdd,
            None,
            Some(owner.snapshot()),
            None,
            Some(event.id),
        )
        .await?;

        if event.is_template() {
            Self::persist_instances(conn, &event, event.id, actor).await?;
        }

        Ok(event)
    }

    /// Expand a recurring template and persist its instances, each with an
    /// owner permission for the creator.
    async fn persist_instances(
        conn: &mut PgConnection,
        template: &Event,
        template_id: Uuid,
        actor: Actor,
    ) -> Result<()> {
        let now = Utc::now();
        for slot in expand(template, None) {
            let instance = Event {
                id: Uuid::now_v7(),
                title: template.title.clone(),
                description: template.description.clone(),
                start_date: slot.start_date,
                end_date: slot.end_date,
                location: template.location.clone(),
                owner_id: template.owner_id,
                created_by: template.created_by,
                updated_by: Some(actor.id),
                created_at: now,
                updated_at: now,
                version: 1,
                is_latest: true,
                parent_version: None,
                is_recurring: false,
                recurrence_pattern: None,
                recurrence_end_date: None,
                custom_recurrence: None,
                parent_event: Some(template_id),
                participants: Vec::new(),
            };
            repositories::insert_event(conn, &instance).await?;
            repositories::insert_permission(
                conn,
                instance.id,
                template.owner_id,
                Role::Owner.as_str(),
                Some(actor.id),
            )
            .await?;
        }
        Ok(())
    }

    /// Alternative slots after the candidate window. One busy-interval fetch
    /// covers the whole probe range; the walk itself is pure.
    async fn suggest_for(conn: &mut PgConnection, candidate: &Interval) -> Result<Vec<Interval>> {
        let probe_span = Interval::new(
            candidate.end_date,
            candidate.end_date + candidate.duration() * (MAX_SLOT_PROBES as i32 + 1),
        );
        let busy = repositories::busy_intervals(conn, &probe_span).await?;
        suggest_slots(candidate, &busy, SUGGESTION_COUNT)
    }

    // ============================================
    // Update
    // ============================================

    /// Apply a partial update as a new version of the lineage.
    ///
    /// A patch that changes nothing is a no-op (no version, no changelog).
    /// Otherwise the superseded row is flipped, a new version inserted, and
    /// one `update` entry (full before/after) plus one `field_update` entry
    /// per changed field appended — all inside the row-locked transaction.
    pub async fn update(&self, event_id: Uuid, patch: EventPatch, actor: Actor) -> Result<Event> {
        let mut tx = self.db.begin().await?;

        let row = repositories::get_event_for_update(&mut tx, event_id)
            .await?
            .ok_or(EventideError::EventNotFound(event_id))?;
        ensure_versionable(&row)?;
        let root = row.root_id();
        self.require(&mut tx, root, actor, Action::Edit).await?;

        let latest_row = if row.is_latest {
            row
        } else {
            repositories::latest_of_lineage_for_update(&mut tx, root)
                .await?
                .ok_or(EventideError::EventNotFound(event_id))?
        };
        let participants = repositories::get_participants(&mut tx, latest_row.id).await?;
        let latest = latest_row.into_event(participants)?;

        let mut probe = latest.clone();
        let changed = patch.apply(&mut probe);
        if changed.is_empty() {
            tx.commit().await.context("failed to commit transaction")?;
            return Ok(latest);
        }

        let mut new_version = version_store::create_version(&mut tx, &latest, actor).await?;
        patch.apply(&mut new_version);
        new_version.validate()?;
        repositories::update_content(&mut tx, &new_version).await?;

        record(
            &mut tx,
            root,
            actor,
            ChangeType::Update,
            Some(latest.snapshot()),
            Some(new_version.snapshot()),
            Some(latest.id),
            Some(new_version.id),
        )
        .await?;
        for field in &changed {
            record(
                &mut tx,
                root,
                actor,
                ChangeType::FieldUpdate,
                Some(field_snapshot(field, &latest)),
                Some(field_snapshot(field, &new_version)),
                Some(latest.id),
                Some(new_version.id),
            )
            .await?;
        }

        // A changed template re-expands from its new values.
        if new_version.is_template() {
            repositories::delete_instances(&mut tx, root).await?;
            Self::persist_instances(&mut tx, &new_version, root, actor).await?;
        }

        tx.commit().await.context("failed to commit transaction")?;

        tracing::info!(
            event_id = %root,
            version = new_version.version,
            fields = ?changed,
            "event updated"
        );
        self.publish(&new_version, "updated").await;
        Ok(new_version)
    }

    // ============================================
    // Delete
    // ============================================

    /// Delete an event lineage and its generated instances. The changelog
    /// keeps the final snapshot; its event references go null on delete.
    pub async fn delete(&self, event_id: Uuid, actor: Actor) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let row = repositories::get_event_for_update(&mut tx, event_id)
            .await?
            .ok_or(EventideError::EventNotFound(event_id))?;
        let root = row.root_id();
        self.require(&mut tx, root, actor, Action::Delete).await?;

        let latest_row = repositories::latest_of_lineage_for_update(&mut tx, root)
            .await?
            .ok_or(EventideError::EventNotFound(event_id))?;
        let participants = repositories::get_participants(&mut tx, latest_row.id).await?;
        let latest = latest_row.into_event(participants)?;

        if latest.is_template() {
            repositories::delete_instances(&mut tx, root).await?;
        }

        record(
            &mut tx,
            root,
            actor,
            ChangeType::Delete,
            Some(latest.snapshot()),
            None,
            Some(latest.id),
            None,
        )
        .await?;
        repositories::delete_event(&mut tx, root).await?;

        tx.commit().await.context("failed to commit transaction")?;

        tracing::info!(event_id = %root, user_id = %actor.id, "event deleted");
        self.publish(&latest, "deleted").await;
        Ok(())
    }

    // ============================================
    // Versions and rollback
    // ============================================

    /// Roll the lineage back to `target_version` by appending a new version
    /// carrying the target's content fields.
    pub async fn rollback(
        &self,
        event_id: Uuid,
        target_version: i32,
        actor: Actor,
    ) -> Result<Event> {
        let mut tx = self.db.begin().await?;

        let row = repositories::get_event_for_update(&mut tx, event_id)
            .await?
            .ok_or(EventideError::EventNotFound(event_id))?;
        ensure_versionable(&row)?;
        let root = row.root_id();
        self.require(&mut tx, root, actor, Action::Edit).await?;

        let latest_row = repositories::latest_of_lineage_for_update(&mut tx, root)
            .await?
            .ok_or(EventideError::EventNotFound(event_id))?;
        let participants = repositories::get_participants(&mut tx, latest_row.id).await?;
        let latest = latest_row.into_event(participants)?;

        if target_version == latest.version {
            return Err(EventideError::validation(format!(
                "cannot rollback to version {target_version} (current version)"
            )));
        }

        let new_version = version_store::rollback(&mut tx, &latest, target_version, actor).await?;
        record(
            &mut tx,
            root,
            actor,
            ChangeType::Rollback,
            Some(latest.snapshot()),
            Some(new_version.snapshot()),
            Some(latest.id),
            Some(new_version.id),
        )
        .await?;

        tx.commit().await.context("failed to commit transaction")?;

        tracing::info!(
            event_id = %root,
            target_version,
            new_version = new_version.version,
            "event rolled back"
        );
        self.publish(&new_version, "rolled_back").await;
        Ok(new_version)
    }

    pub async fn list_versions(&self, event_id: Uuid, actor: Actor) -> Result<Vec<Event>> {
        let mut conn = self.acquire().await?;
        let root = self.resolve_root(&mut conn, event_id).await?;
        self.require(&mut conn, root, actor, Action::View).await?;

        let rows = repositories::list_versions(&mut conn, root).await?;
        self.hydrate(&mut conn, rows).await
    }

    pub async fn get_version(&self, event_id: Uuid, version: i32, actor: Actor) -> Result<Event> {
        let mut conn = self.acquire().await?;
        let root = self.resolve_root(&mut conn, event_id).await?;
        self.require(&mut conn, root, actor, Action::View).await?;

        let row = repositories::find_version(&mut conn, root, version)
            .await?
            .ok_or(EventideError::version_not_found(root, version))?;
        let participants = repositories::get_participants(&mut conn, row.id).await?;
        Ok(row.into_event(participants)?)
    }

    // ============================================
    // Changelog and diffs
    // ============================================

    pub async fn list_changelog(&self, event_id: Uuid, actor: Actor) -> Result<Vec<ChangeLogEntry>> {
        let mut conn = self.acquire().await?;
        let root = self.resolve_root(&mut conn, event_id).await?;
        self.require(&mut conn, root, actor, Action::View).await?;

        let rows = repositories::list_changelog(&mut conn, root).await?;
        rows.into_iter()
            .map(|row| ChangeLogEntry::try_from(row).map_err(EventideError::from))
            .collect()
    }

    /// Field-level difference between two versions of a lineage.
    ///
    /// Prefers a single changelog row spanning exactly (lo, hi); otherwise
    /// aggregates every span inside the range, oldest first (first old value
    /// wins, last new value wins). Empty when nothing matches.
    pub async fn diff_between_versions(
        &self,
        event_id: Uuid,
        v1: i32,
        v2: i32,
        actor: Actor,
    ) -> Result<Diff> {
        let mut conn = self.acquire().await?;
        let root = self.resolve_root(&mut conn, event_id).await?;
        self.require(&mut conn, root, actor, Action::View).await?;

        let (lo, hi) = (v1.min(v2), v1.max(v2));
        if let Some(row) = repositories::changelog_exact_span(&mut conn, root, lo, hi).await? {
            return Ok(ChangeLogEntry::try_from(row)?.diff());
        }

        let rows = repositories::changelog_spans_within(&mut conn, root, lo, hi).await?;
        let diffs = rows
            .into_iter()
            .map(|row| ChangeLogEntry::try_from(row).map(|entry| entry.diff()))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(eventide_core::aggregate_diffs(diffs))
    }

    // ============================================
    // Permissions
    // ============================================

    pub async fn list_permissions(
        &self,
        event_id: Uuid,
        actor: Actor,
    ) -> Result<Vec<EventPermission>> {
        let mut conn = self.acquire().await?;
        let root = self.resolve_root(&mut conn, event_id).await?;
        self.require(&mut conn, root, actor, Action::View).await?;

        let rows = repositories::list_permissions(&mut conn, root).await?;
        rows.into_iter()
            .map(|row| EventPermission::try_from(row).map_err(EventideError::from))
            .collect()
    }

    /// Share an event with a user: insert a new permission or change an
    /// existing one. Granting a second owner fails `DuplicateOwner`; demoting
    /// the owner fails `CannotRemoveOwner`.
    pub async fn share(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        role: Role,
        actor: Actor,
    ) -> Result<EventPermission> {
        let mut tx = self.db.begin().await?;

        let row = repositories::get_event_for_update(&mut tx, event_id)
            .await?
            .ok_or(EventideError::EventNotFound(event_id))?;
        let root = row.root_id();
        self.require(&mut tx, root, actor, Action::ManagePermissions)
            .await?;

        check_owner_grant(
            role,
            repositories::owner_exists(&mut tx, root, Some(user_id)).await?,
        )?;

        let existing = repositories::get_permission(&mut tx, root, user_id).await?;
        let permission = match existing {
            Some(current) => {
                let current = EventPermission::try_from(current)?;
                if current.role == role {
                    tx.commit().await.context("failed to commit transaction")?;
                    return Ok(current);
                }
                if current.role == Role::Owner {
                    return Err(EventideError::CannotRemoveOwner);
                }
                let updated =
                    repositories::update_permission_role(&mut tx, root, user_id, role.as_str())
                        .await?
                        .ok_or(EventideError::EventNotFound(event_id))?;
                let updated = EventPermission::try_from(updated)?;
                record(
                    &mut tx,
                    root,
                    actor,
                    ChangeType::PermissionUpdate,
                    Some(current.snapshot()),
                    Some(updated.snapshot()),
                    None,
                    None,
                )
                .await?;
                updated
            }
            None => {
                let inserted = repositories::insert_permission(
                    &mut tx,
                    root,
                    user_id,
                    role.as_str(),
                    Some(actor.id),
                )
                .await?;
                let inserted = EventPermission::try_from(inserted)?;
                record(
                    &mut tx,
                    root,
                    actor,
                    ChangeType::Share,
                    None,
                    Some(inserted.snapshot()),
                    None,
                    None,
                )
                .await?;
                inserted
            }
        };

        tx.commit().await.context("failed to commit transaction")?;
        tracing::info!(event_id = %root, user_id = %user_id, role = %role, "event shared");
        Ok(permission)
    }

    /// Revoke a user's permission. The owner permission may never be revoked
    /// while the event exists.
    pub async fn revoke(&self, event_id: Uuid, user_id: Uuid, actor: Actor) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let row = repositories::get_event_for_update(&mut tx, event_id)
            .await?
            .ok_or(EventideError::EventNotFound(event_id))?;
        let root = row.root_id();
        self.require(&mut tx, root, actor, Action::ManagePermissions)
            .await?;

        let permission = repositories::get_permission(&mut tx, root, user_id)
            .await?
            .ok_or_else(|| {
                EventideError::validation(format!("user {user_id} has no permission on this event"))
            })?;
        let permission = EventPermission::try_from(permission)?;
        if permission.role == Role::Owner {
            return Err(EventideError::CannotRemoveOwner);
        }

        repositories::delete_permission(&mut tx, root, user_id).await?;
        record(
            &mut tx,
            root,
            actor,
            ChangeType::PermissionDelete,
            Some(permission.snapshot()),
            None,
            None,
            None,
        )
        .await?;

        tx.commit().await.context("failed to commit transaction")?;
        tracing::info!(event_id = %root, user_id = %user_id, "permission revoked");
        Ok(())
    }

    /// Replace the event's permission set with `desired`, as a symmetric
    /// difference: removed pairs are deleted, added pairs inserted, and one
    /// `permission_update` entry records the whole desired set.
    pub async fn update_permissions(
        &self,
        event_id: Uuid,
        desired: Vec<(Uuid, Role)>,
        actor: Actor,
    ) -> Result<Vec<EventPermission>> {
        let mut tx = self.db.begin().await?;

        let row = repositories::get_event_for_update(&mut tx, event_id)
            .await?
            .ok_or(EventideError::EventNotFound(event_id))?;
        let root = row.root_id();
        self.require(&mut tx, root, actor, Action::ManagePermissions)
            .await?;

        let current_rows = repositories::list_permissions(&mut tx, root).await?;
        let current = current_rows
            .into_iter()
            .map(|row| EventPermission::try_from(row).map_err(EventideError::from))
            .collect::<Result<Vec<_>>>()?;

        let current_pairs: Vec<(Uuid, Role)> =
            current.iter().map(|p| (p.user_id, p.role)).collect();
        let (removed, added) = permission_delta(&current_pairs, &desired);

        if removed.iter().any(|(_, role)| *role == Role::Owner) {
            return Err(EventideError::CannotRemoveOwner);
        }

        for (user_id, _) in &removed {
            repositories::delete_permission(&mut tx, root, *user_id).await?;
        }
        for (user_id, role) in &added {
            check_owner_grant(
                *role,
                repositories::owner_exists(&mut tx, root, Some(*user_id)).await?,
            )?;
            repositories::insert_permission(&mut tx, root, *user_id, role.as_str(), Some(actor.id))
                .await?;
        }

        record(
            &mut tx,
            root,
            actor,
            ChangeType::PermissionUpdate,
            Some(permission_set_snapshot(&current_pairs)),
            Some(permission_set_snapshot(&desired)),
            None,
            None,
        )
        .await?;

        tx.commit().await.context("failed to commit transaction")?;
        tracing::info!(event_id = %root, "permissions replaced");

        let mut conn = self.acquire().await?;
        let rows = repositories::list_permissions(&mut conn, root).await?;
        rows.into_iter()
            .map(|row| EventPermission::try_from(row).map_err(EventideError::from))
            .collect()
    }

    // ============================================
    // Reads
    // ============================================

    /// Latest version of the lineage the id belongs to.
    pub async fn get(&self, event_id: Uuid, actor: Actor) -> Result<Event> {
        let mut conn = self.acquire().await?;
        let root = self.resolve_root(&mut conn, event_id).await?;
        self.require(&mut conn, root, actor, Action::View).await?;

        let row = repositories::latest_of_lineage(&mut conn, root)
            .await?
            .ok_or(EventideError::EventNotFound(event_id))?;
        let participants = repositories::get_participants(&mut conn, row.id).await?;
        Ok(row.into_event(participants)?)
    }

    /// Latest events the actor owns or holds a permission on.
    pub async fn list(&self, actor: Actor, filter: EventFilter) -> Result<Vec<Event>> {
        let mut conn = self.acquire().await?;
        let rows =
            repositories::list_events_for(&mut conn, actor.id, actor.is_superuser, &filter).await?;
        self.hydrate(&mut conn, rows).await
    }

    // ============================================
    // Internals
    // ============================================

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        Ok(self
            .db
            .pool()
            .acquire()
            .await
            .context("failed to acquire connection")?)
    }

    async fn resolve_root(&self, conn: &mut PgConnection, event_id: Uuid) -> Result<Uuid> {
        let row = repositories::get_event(conn, event_id)
            .await?
            .ok_or(EventideError::EventNotFound(event_id))?;
        Ok(row.root_id())
    }

    /// Gate `action` on the actor's role for the event. Superusers bypass
    /// the table entirely.
    async fn require(
        &self,
        conn: &mut PgConnection,
        event_id: Uuid,
        actor: Actor,
        action: Action,
    ) -> Result<()> {
        if actor.is_superuser {
            return Ok(());
        }
        let role = repositories::get_permission(conn, event_id, actor.id)
            .await?
            .map(|row| row.role.parse::<Role>())
            .transpose()?;

        match role {
            Some(role) if role.allows(action) => Ok(()),
            _ => Err(EventideError::denied(
                "you don't have permission to access this event",
            )),
        }
    }

    async fn hydrate(
        &self,
        conn: &mut PgConnection,
        rows: Vec<EventRow>,
    ) -> Result<Vec<Event>> {
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let participants = repositories::get_participants(conn, row.id).await?;
            events.push(row.into_event(participants)?);
        }
        Ok(events)
    }

    /// Best-effort realtime publish; a sink failure is logged and swallowed.
    async fn publish(&self, event: &Event, action: &str) {
        let Some(sink) = &self.sink else { return };
        let payload = json!({ "action": action, "event": event });
        if let Err(e) = sink.publish(event.root_id(), payload).await {
            tracing::warn!(event_id = %event.root_id(), error = %e, "realtime publish failed");
        }
    }
}

/// Append one changelog row inside the caller's transaction.
#[allow(clippy::too_many_arguments)]
async fn record(
    conn: &mut PgConnection,
    event_id: Uuid,
    actor: Actor,
    change_type: ChangeType,
    previous_data: Option<Map<String, Value>>,
    new_data: Option<Map<String, Value>>,
    old_version_id: Option<Uuid>,
    new_version_id: Option<Uuid>,
) -> Result<()> {
    let previous_data = previous_data.map(Value::Object);
    let new_data = new_data.map(Value::Object);
    repositories::insert_changelog(
        conn,
        event_id,
        actor.id,
        change_type.as_str(),
        previous_data.as_ref(),
        new_data.as_ref(),
        old_version_id,
        new_version_id,
    )
    .await?;
    Ok(())
}

/// Generated instances are leaves of their template: they are never
/// versioned, only re-expanded. Versioning one would detach it from its
/// template via the fresh row's null `parent_event`.
fn ensure_versionable(row: &EventRow) -> Result<()> {
    if row.parent_event.is_some() {
        return Err(EventideError::validation(
            "generated instances cannot be versioned; edit the template event",
        ));
    }
    Ok(())
}

/// Single-owner rule at grant time.
fn check_owner_grant(role: Role, other_owner_exists: bool) -> Result<()> {
    if role == Role::Owner && other_owner_exists {
        return Err(EventideError::DuplicateOwner);
    }
    Ok(())
}

fn conflict_summary(row: &EventRow) -> ConflictingEvent {
    ConflictingEvent {
        id: row.id,
        title: row.title.clone(),
        start_date: row.start_date,
        end_date: row.end_date,
    }
}

fn field_snapshot(field: &str, event: &Event) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert(field.to_string(), event.field_value(field));
    data
}

fn permission_set_snapshot(pairs: &[(Uuid, Role)]) -> Map<String, Value> {
    let list: Vec<Value> = pairs
        .iter()
        .map(|(user_id, role)| json!({ "user_id": user_id, "role": role.as_str() }))
        .collect();
    let mut data = Map::new();
    data.insert("permissions".into(), Value::Array(list));
    data
}

/// Symmetric difference between the current and desired (user, role) sets.
fn permission_delta(
    current: &[(Uuid, Role)],
    desired: &[(Uuid, Role)],
) -> (Vec<(Uuid, Role)>, Vec<(Uuid, Role)>) {
    let current_set: BTreeSet<_> = current.iter().copied().collect();
    let desired_set: BTreeSet<_> = desired.iter().copied().collect();

    let removed = current_set.difference(&desired_set).copied().collect();
    let added = desired_set.difference(&current_set).copied().collect();
    (removed, added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn permission_delta_is_symmetric_difference() {
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        let carol = Uuid::now_v7();

        let current = vec![(alice, Role::Owner), (bob, Role::Editor)];
        let desired = vec![(alice, Role::Owner), (bob, Role::Viewer), (carol, Role::Viewer)];

        let (removed, added) = permission_delta(&current, &desired);
        assert_eq!(removed, vec![(bob, Role::Editor)]);
        assert!(added.contains(&(bob, Role::Viewer)));
        assert!(added.contains(&(carol, Role::Viewer)));
        assert_eq!(added.len(), 2);
    }

    #[test]
    fn permission_delta_of_equal_sets_is_empty() {
        let alice = Uuid::now_v7();
        let pairs = vec![(alice, Role::Owner)];
        let (removed, added) = permission_delta(&pairs, &pairs);
        assert!(removed.is_empty());
        assert!(added.is_empty());
    }

    #[test]
    fn field_snapshot_carries_single_field() {
        let start = chrono::Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let event = Event {
            id: Uuid::now_v7(),
            title: "Planning".into(),
            description: String::new(),
            start_date: start,
            end_date: start + chrono::Duration::hours(2),
            location: String::new(),
            owner_id: Uuid::now_v7(),
            created_by: Uuid::now_v7(),
            updated_by: None,
            created_at: start,
            updated_at: start,
            version: 2,
            is_latest: true,
            parent_version: Some(Uuid::now_v7()),
            is_recurring: false,
            recurrence_pattern: None,
            recurrence_end_date: None,
            custom_recurrence: None,
            parent_event: None,
            participants: vec![],
        };

        let snap = field_snapshot("title", &event);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap["title"], json!("Planning"));
    }

    fn sample_row(parent_event: Option<Uuid>) -> EventRow {
        let start = chrono::Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        EventRow {
            id: Uuid::now_v7(),
            title: "Standup".into(),
            description: String::new(),
            start_date: start,
            end_date: start + chrono::Duration::hours(1),
            location: String::new(),
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
            parent_event,
        }
    }

    #[test]
    fn generated_instance_is_not_versionable() {
        let instance = sample_row(Some(Uuid::now_v7()));
        assert!(matches!(
            ensure_versionable(&instance),
            Err(EventideError::Validation(_))
        ));
    }

    #[test]
    fn template_and_plain_rows_are_versionable() {
        assert!(ensure_versionable(&sample_row(None)).is_ok());
    }

    #[test]
    fn second_owner_grant_is_rejected() {
        assert!(matches!(
            check_owner_grant(Role::Owner, true),
            Err(EventideError::DuplicateOwner)
        ));
        assert!(check_owner_grant(Role::Owner, false).is_ok());
        assert!(check_owner_grant(Role::Editor, true).is_ok());
    }

    #[test]
    fn permission_set_snapshot_lists_whole_set() {
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        let snap = permission_set_snapshot(&[(alice, Role::Owner), (bob, Role::Viewer)]);

        let list = snap["permissions"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["role"], json!("owner"));
        assert_eq!(list[1]["user_id"], json!(bob));
    }
}
