// Version history, rollback and changelog HTTP routes

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use eventide_core::Diff;
use eventide_storage::ChangeLogEntry;

use crate::auth::CurrentActor;
use crate::common::{api_response, ApiResult};
use crate::events::{to_json, EventDto};
use crate::AppState;

/// One changelog entry, with the field-level diff computed from its snapshots
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChangeLogDto {
    pub id: Uuid,
    pub event_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    #[schema(value_type = String, example = "update")]
    pub change_type: String,
    #[schema(value_type = Object, nullable)]
    pub previous_data: Option<Map<String, Value>>,
    #[schema(value_type = Object, nullable)]
    pub new_data: Option<Map<String, Value>>,
    pub old_version_id: Option<Uuid>,
    pub new_version_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub diff: Diff,
    pub created_at: DateTime<Utc>,
}

impl From<ChangeLogEntry> for ChangeLogDto {
    fn from(entry: ChangeLogEntry) -> Self {
        let diff = entry.diff();
        ChangeLogDto {
            id: entry.id,
            event_id: entry.event_id,
            user_id: entry.user_id,
            change_type: entry.change_type.as_str().to_string(),
            previous_data: entry.previous_data,
            new_data: entry.new_data,
            old_version_id: entry.old_version_id,
            new_version_id: entry.new_version_id,
            diff,
            created_at: entry.created_at,
        }
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/events/:event_id/versions", get(list_versions))
        .route(
            "/v1/events/:event_id/versions/:version",
            get(get_version).post(rollback),
        )
        .route("/v1/events/:event_id/changelog", get(list_changelog))
        .route("/v1/events/:event_id/diff/:v1/:v2", get(diff_versions))
        .with_state(state)
}

/// GET /v1/events/{event_id}/versions - Full version history, oldest first
#[utoipa::path(
    get,
    path = "/v1/events/{event_id}/versions",
    params(("event_id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Versions retrieved successfully", body = crate::common::ApiResponse),
        (status = 403, description = "No view permission"),
        (status = 404, description = "Event not found")
    ),
    tag = "versions"
)]
pub async fn list_versions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Response> {
    let versions = state.events.list_versions(event_id, actor).await?;
    let dtos: Vec<EventDto> = versions.into_iter().map(EventDto::from).collect();
    Ok(api_response(
        StatusCode::OK,
        "Versions retrieved successfully",
        Some(to_json(&dtos)?),
    ))
}

/// GET /v1/events/{event_id}/versions/{version} - One historical version
#[utoipa::path(
    get,
    path = "/v1/events/{event_id}/versions/{version}",
    params(
        ("event_id" = Uuid, Path, description = "Event ID"),
        ("version" = i32, Path, description = "Version number, 1-based")
    ),
    responses(
        (status = 200, description = "Version retrieved successfully", body = crate::common::ApiResponse),
        (status = 404, description = "Event or version not found")
    ),
    tag = "versions"
)]
pub async fn get_version(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((event_id, version)): Path<(Uuid, i32)>,
) -> ApiResult<Response> {
    let event = state.events.get_version(event_id, version, actor).await?;
    Ok(api_response(
        StatusCode::OK,
        "Version retrieved successfully",
        Some(to_json(&EventDto::from(event))?),
    ))
}

/// POST /v1/events/{event_id}/versions/{version} - Roll back to a version
///
/// Rolling back never rewrites history: the target version's content is copied
/// into a brand new latest version.
#[utoipa::path(
    post,
    path = "/v1/events/{event_id}/versions/{version}",
    params(
        ("event_id" = Uuid, Path, description = "Event ID"),
        ("version" = i32, Path, description = "Version to restore")
    ),
    responses(
        (status = 200, description = "Event rolled back successfully", body = crate::common::ApiResponse),
        (status = 400, description = "Target is already the current version"),
        (status = 403, description = "No edit permission"),
        (status = 404, description = "Event or version not found")
    ),
    tag = "versions"
)]
pub async fn rollback(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((event_id, version)): Path<(Uuid, i32)>,
) -> ApiResult<Response> {
    let event = state.events.rollback(event_id, version, actor).await?;
    Ok(api_response(
        StatusCode::OK,
        "Event rolled back successfully",
        Some(to_json(&EventDto::from(event))?),
    ))
}

/// GET /v1/events/{event_id}/changelog - Audit trail, newest first
#[utoipa::path(
    get,
    path = "/v1/events/{event_id}/changelog",
    params(("event_id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Changelog retrieved successfully", body = crate::common::ApiResponse),
        (status = 403, description = "No view permission"),
        (status = 404, description = "Event not found")
    ),
    tag = "versions"
)]
pub async fn list_changelog(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Response> {
    let entries = state.events.list_changelog(event_id, actor).await?;
    let dtos: Vec<ChangeLogDto> = entries.into_iter().map(ChangeLogDto::from).collect();
    Ok(api_response(
        StatusCode::OK,
        "Changelog retrieved successfully",
        Some(to_json(&dtos)?),
    ))
}

/// GET /v1/events/{event_id}/diff/{v1}/{v2} - Aggregated diff between versions
#[utoipa::path(
    get,
    path = "/v1/events/{event_id}/diff/{v1}/{v2}",
    params(
        ("event_id" = Uuid, Path, description = "Event ID"),
        ("v1" = i32, Path, description = "One endpoint of the version range"),
        ("v2" = i32, Path, description = "The other endpoint of the version range")
    ),
    responses(
        (status = 200, description = "Diff computed successfully", body = crate::common::ApiResponse),
        (status = 403, description = "No view permission"),
        (status = 404, description = "Event or version not found")
    ),
    tag = "versions"
)]
pub async fn diff_versions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((event_id, v1, v2)): Path<(Uuid, i32, i32)>,
) -> ApiResult<Response> {
    let diff = state
        .events
        .diff_between_versions(event_id, v1, v2, actor)
        .await?;
    Ok(api_response(
        StatusCode::OK,
        "Diff computed successfully",
        Some(to_json(&diff)?),
    ))
}
