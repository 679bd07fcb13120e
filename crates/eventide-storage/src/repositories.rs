// Repository layer for database operations
//
// Mutating queries take `&mut PgConnection` so they compose into the caller's
// transaction; the Database wrapper owns the pool and transaction handles.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use eventide_core::{Event, Interval};

use crate::models::{ChangeLogRow, EventFilter, EventPermissionRow, EventRow};

const EVENT_COLUMNS: &str = "id, title, description, start_date, end_date, location, owner_id, \
     created_by, updated_by, created_at, updated_at, version, is_latest, parent_version, \
     is_recurring, recurrence_pattern, recurrence_end_date, custom_recurrence, parent_event";

const PERMISSION_COLUMNS: &str =
    "id, event_id, user_id, role, granted_by, created_at, updated_at";

const CHANGELOG_COLUMNS: &str = "id, event_id, user_id, change_type, previous_data, new_data, \
     old_version_id, new_version_id, created_at";

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("failed to connect to database")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool.begin().await.context("failed to begin transaction")
    }
}

// ============================================
// Events
// ============================================

pub async fn insert_event(conn: &mut PgConnection, event: &Event) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO events (id, title, description, start_date, end_date, location, owner_id,
                            created_by, updated_by, created_at, updated_at, version, is_latest,
                            parent_version, is_recurring, recurrence_pattern, recurrence_end_date,
                            custom_recurrence, parent_event)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        "#,
    )
    .bind(event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.start_date)
    .bind(event.end_date)
    .bind(&event.location)
    .bind(event.owner_id)
    .bind(event.created_by)
    .bind(event.updated_by)
    .bind(event.created_at)
    .bind(event.updated_at)
    .bind(event.version)
    .bind(event.is_latest)
    .bind(event.parent_version)
    .bind(event.is_recurring)
    .bind(event.recurrence_pattern.map(|p| p.as_str()))
    .bind(event.recurrence_end_date)
    .bind(&event.custom_recurrence)
    .bind(event.parent_event)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn get_event(conn: &mut PgConnection, id: Uuid) -> Result<Option<EventRow>> {
    let row = sqlx::query_as::<_, EventRow>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Fetch an event with a pessimistic row lock, serializing concurrent
/// mutations of the same event for the duration of the transaction.
pub async fn get_event_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Option<EventRow>> {
    let row = sqlx::query_as::<_, EventRow>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Highest-version row of a lineage. Takes no lock; read paths only.
pub async fn latest_of_lineage(conn: &mut PgConnection, root: Uuid) -> Result<Option<EventRow>> {
    let row = sqlx::query_as::<_, EventRow>(&format!(
        r#"
        SELECT {EVENT_COLUMNS} FROM events
        WHERE id = $1 OR parent_version = $1
        ORDER BY version DESC
        LIMIT 1
        "#
    ))
    .bind(root)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Highest-version row of a lineage, locked for the caller's transaction.
pub async fn latest_of_lineage_for_update(
    conn: &mut PgConnection,
    root: Uuid,
) -> Result<Option<EventRow>> {
    let row = sqlx::query_as::<_, EventRow>(&format!(
        r#"
        SELECT {EVENT_COLUMNS} FROM events
        WHERE id = $1 OR parent_version = $1
        ORDER BY version DESC
        LIMIT 1
        FOR UPDATE
        "#
    ))
    .bind(root)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

pub async fn find_version(
    conn: &mut PgConnection,
    root: Uuid,
    version: i32,
) -> Result<Option<EventRow>> {
    let row = sqlx::query_as::<_, EventRow>(&format!(
        r#"
        SELECT {EVENT_COLUMNS} FROM events
        WHERE (id = $1 OR parent_version = $1) AND version = $2
        "#
    ))
    .bind(root)
    .bind(version)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

pub async fn list_versions(conn: &mut PgConnection, root: Uuid) -> Result<Vec<EventRow>> {
    let rows = sqlx::query_as::<_, EventRow>(&format!(
        r#"
        SELECT {EVENT_COLUMNS} FROM events
        WHERE id = $1 OR parent_version = $1
        ORDER BY version ASC
        "#
    ))
    .bind(root)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Flip `is_latest` off the superseded row. Half of the atomic "supersede"
/// step; always paired with the new-version insert in one transaction.
pub async fn mark_superseded(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE events SET is_latest = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Overwrite the content fields of an existing row (rollback's field copy and
/// patch application on a freshly inserted version).
pub async fn update_content(conn: &mut PgConnection, event: &Event) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE events
        SET title = $2, description = $3, start_date = $4, end_date = $5, location = $6,
            is_recurring = $7, recurrence_pattern = $8, recurrence_end_date = $9,
            custom_recurrence = $10, updated_by = $11, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.start_date)
    .bind(event.end_date)
    .bind(&event.location)
    .bind(event.is_recurring)
    .bind(event.recurrence_pattern.map(|p| p.as_str()))
    .bind(event.recurrence_end_date)
    .bind(&event.custom_recurrence)
    .bind(event.updated_by)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn delete_event(conn: &mut PgConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove all generated instances of a recurring template.
pub async fn delete_instances(conn: &mut PgConnection, template: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM events WHERE parent_event = $1")
        .bind(template)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Events visible to a user: latest rows they own or hold a permission on,
/// optionally windowed, newest-first, paginated. Superusers see everything.
pub async fn list_events_for(
    conn: &mut PgConnection,
    user_id: Uuid,
    is_superuser: bool,
    filter: &EventFilter,
) -> Result<Vec<EventRow>> {
    let rows = sqlx::query_as::<_, EventRow>(&format!(
        r#"
        SELECT {EVENT_COLUMNS} FROM events e
        WHERE e.is_latest = TRUE
          AND ($2::timestamptz IS NULL OR e.start_date >= $2)
          AND ($3::timestamptz IS NULL OR e.end_date <= $3)
          AND ($4 OR e.owner_id = $1 OR EXISTS (
                SELECT 1 FROM event_permissions ep
                WHERE ep.event_id = e.id AND ep.user_id = $1))
        ORDER BY e.start_date DESC
        LIMIT $5 OFFSET $6
        "#
    ))
    .bind(user_id)
    .bind(filter.start_date)
    .bind(filter.end_date)
    .bind(is_superuser)
    .bind(filter.limit())
    .bind(filter.offset())
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

// ============================================
// Participants
// ============================================

pub async fn insert_participants(
    conn: &mut PgConnection,
    event_id: Uuid,
    participants: &[Uuid],
) -> Result<()> {
    for user_id in participants {
        sqlx::query(
            "INSERT INTO event_participants (event_id, user_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn get_participants(conn: &mut PgConnection, event_id: Uuid) -> Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("SELECT user_id FROM event_participants WHERE event_id = $1 ORDER BY user_id")
            .bind(event_id)
            .fetch_all(conn)
            .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

// ============================================
// Conflict queries
// ============================================

/// Latest rows overlapping the candidate window (half-open: touching
/// endpoints do not overlap), optionally restricted to events sharing at
/// least one of the given participants. Superseded version rows are not real
/// occurrences and are excluded; generated instances count.
pub async fn find_conflicts(
    conn: &mut PgConnection,
    window: &Interval,
    exclude_id: Option<Uuid>,
    participants: &[Uuid],
) -> Result<Vec<EventRow>> {
    let rows = sqlx::query_as::<_, EventRow>(&format!(
        r#"
        SELECT {EVENT_COLUMNS} FROM events e
        WHERE e.is_latest = TRUE
          AND e.start_date < $1 AND e.end_date > $2
          AND ($3::uuid IS NULL OR e.id <> $3)
          AND (cardinality($4::uuid[]) = 0 OR EXISTS (
                SELECT 1 FROM event_participants p
                WHERE p.event_id = e.id AND p.user_id = ANY($4)))
        ORDER BY e.start_date ASC
        "#
    ))
    .bind(window.end_date)
    .bind(window.start_date)
    .bind(exclude_id)
    .bind(participants)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Occupied intervals inside a probe window, for slot suggestion.
pub async fn busy_intervals(conn: &mut PgConnection, window: &Interval) -> Result<Vec<Interval>> {
    let rows: Vec<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> =
        sqlx::query_as(
            r#"
            SELECT start_date, end_date FROM events
            WHERE is_latest = TRUE AND start_date < $1 AND end_date > $2
            ORDER BY start_date ASC
            "#,
        )
        .bind(window.end_date)
        .bind(window.start_date)
        .fetch_all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(start, end)| Interval::new(start, end))
        .collect())
}

// ============================================
// Permissions
// ============================================

pub async fn insert_permission(
    conn: &mut PgConnection,
    event_id: Uuid,
    user_id: Uuid,
    role: &str,
    granted_by: Option<Uuid>,
) -> Result<EventPermissionRow> {
    let row = sqlx::query_as::<_, EventPermissionRow>(&format!(
        r#"
        INSERT INTO event_permissions (id, event_id, user_id, role, granted_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {PERMISSION_COLUMNS}
        "#
    ))
    .bind(Uuid::now_v7())
    .bind(event_id)
    .bind(user_id)
    .bind(role)
    .bind(granted_by)
    .fetch_one(conn)
    .await?;

    Ok(row)
}

pub async fn update_permission_role(
    conn: &mut PgConnection,
    event_id: Uuid,
    user_id: Uuid,
    role: &str,
) -> Result<Option<EventPermissionRow>> {
    let row = sqlx::query_as::<_, EventPermissionRow>(&format!(
        r#"
        UPDATE event_permissions
        SET role = $3, updated_at = NOW()
        WHERE event_id = $1 AND user_id = $2
        RETURNING {PERMISSION_COLUMNS}
        "#
    ))
    .bind(event_id)
    .bind(user_id)
    .bind(role)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

pub async fn get_permission(
    conn: &mut PgConnection,
    event_id: Uuid,
    user_id: Uuid,
) -> Result<Option<EventPermissionRow>> {
    let row = sqlx::query_as::<_, EventPermissionRow>(&format!(
        "SELECT {PERMISSION_COLUMNS} FROM event_permissions WHERE event_id = $1 AND user_id = $2"
    ))
    .bind(event_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

pub async fn list_permissions(
    conn: &mut PgConnection,
    event_id: Uuid,
) -> Result<Vec<EventPermissionRow>> {
    let rows = sqlx::query_as::<_, EventPermissionRow>(&format!(
        "SELECT {PERMISSION_COLUMNS} FROM event_permissions WHERE event_id = $1 \
         ORDER BY created_at ASC"
    ))
    .bind(event_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

pub async fn delete_permission(
    conn: &mut PgConnection,
    event_id: Uuid,
    user_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM event_permissions WHERE event_id = $1 AND user_id = $2")
        .bind(event_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Single-owner rule: true when some other user already owns the event.
pub async fn owner_exists(
    conn: &mut PgConnection,
    event_id: Uuid,
    exclude_user: Option<Uuid>,
) -> Result<bool> {
    let (exists,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM event_permissions
            WHERE event_id = $1 AND role = 'owner'
              AND ($2::uuid IS NULL OR user_id <> $2)
        )
        "#,
    )
    .bind(event_id)
    .bind(exclude_user)
    .fetch_one(conn)
    .await?;

    Ok(exists)
}

// ============================================
// Changelog
// ============================================

pub async fn insert_changelog(
    conn: &mut PgConnection,
    event_id: Uuid,
    user_id: Uuid,
    change_type: &str,
    previous_data: Option<&serde_json::Value>,
    new_data: Option<&serde_json::Value>,
    old_version_id: Option<Uuid>,
    new_version_id: Option<Uuid>,
) -> Result<ChangeLogRow> {
    let row = sqlx::query_as::<_, ChangeLogRow>(&format!(
        r#"
        INSERT INTO event_changelog (id, event_id, user_id, change_type, previous_data, new_data,
                                     old_version_id, new_version_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {CHANGELOG_COLUMNS}
        "#
    ))
    .bind(Uuid::now_v7())
    .bind(event_id)
    .bind(user_id)
    .bind(change_type)
    .bind(previous_data)
    .bind(new_data)
    .bind(old_version_id)
    .bind(new_version_id)
    .fetch_one(conn)
    .await?;

    Ok(row)
}

pub async fn list_changelog(conn: &mut PgConnection, event_id: Uuid) -> Result<Vec<ChangeLogRow>> {
    let rows = sqlx::query_as::<_, ChangeLogRow>(&format!(
        "SELECT {CHANGELOG_COLUMNS} FROM event_changelog WHERE event_id = $1 \
         ORDER BY created_at DESC"
    ))
    .bind(event_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Changelog row whose referenced version rows span exactly (lo, hi).
/// Version numbers are resolved by joining the explicit version references
/// back to the events table.
pub async fn changelog_exact_span(
    conn: &mut PgConnection,
    event_id: Uuid,
    lo: i32,
    hi: i32,
) -> Result<Option<ChangeLogRow>> {
    let row = sqlx::query_as::<_, ChangeLogRow>(
        r#"
        SELECT cl.id, cl.event_id, cl.user_id, cl.change_type, cl.previous_data, cl.new_data,
               cl.old_version_id, cl.new_version_id, cl.created_at
        FROM event_changelog cl
        JOIN events ov ON ov.id = cl.old_version_id
        JOIN events nv ON nv.id = cl.new_version_id
        WHERE cl.event_id = $1 AND cl.change_type <> 'field_update'
          AND ov.version = $2 AND nv.version = $3
        ORDER BY cl.created_at DESC
        LIMIT 1
        "#,
    )
    .bind(event_id)
    .bind(lo)
    .bind(hi)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// All changelog rows whose version span falls inside [lo, hi], oldest span
/// first, for aggregation. Field-level entries are excluded so a span is not
/// double-counted against its full-snapshot `update` row.
pub async fn changelog_spans_within(
    conn: &mut PgConnection,
    event_id: Uuid,
    lo: i32,
    hi: i32,
) -> Result<Vec<ChangeLogRow>> {
    let rows = sqlx::query_as::<_, ChangeLogRow>(
        r#"
        SELECT cl.id, cl.event_id, cl.user_id, cl.change_type, cl.previous_data, cl.new_data,
               cl.old_version_id, cl.new_version_id, cl.created_at
        FROM event_changelog cl
        JOIN events ov ON ov.id = cl.old_version_id
        JOIN events nv ON nv.id = cl.new_version_id
        WHERE cl.event_id = $1 AND cl.change_type <> 'field_update'
          AND ov.version >= $2 AND nv.version <= $3
        ORDER BY ov.version ASC, cl.created_at ASC
        "#,
    )
    .bind(event_id)
    .bind(lo)
    .bind(hi)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}
