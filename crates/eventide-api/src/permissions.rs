// Permission sharing HTTP routes

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use eventide_core::Role;
use eventide_storage::EventPermission;

use crate::auth::CurrentActor;
use crate::common::{api_response, ApiResult};
use crate::events::to_json;
use crate::AppState;

/// One user's grant on an event
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PermissionDto {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    #[schema(value_type = String, example = "editor")]
    pub role: Role,
    pub granted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EventPermission> for PermissionDto {
    fn from(p: EventPermission) -> Self {
        PermissionDto {
            id: p.id,
            event_id: p.event_id,
            user_id: p.user_id,
            role: p.role,
            granted_by: p.granted_by,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Request to grant (or re-grant with a new role) access to one user
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ShareRequest {
    pub user_id: Uuid,
    #[schema(value_type = String, example = "viewer")]
    pub role: Role,
}

/// Request to replace the full permission set of an event
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReplacePermissionsRequest {
    pub permissions: Vec<ShareRequest>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/events/:event_id/permissions",
            get(list_permissions)
                .post(share_event)
                .put(replace_permissions),
        )
        .route(
            "/v1/events/:event_id/permissions/:user_id",
            delete(revoke_permission),
        )
        .with_state(state)
}

/// GET /v1/events/{event_id}/permissions - Grants on an event
#[utoipa::path(
    get,
    path = "/v1/events/{event_id}/permissions",
    params(("event_id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Permissions retrieved successfully", body = crate::common::ApiResponse),
        (status = 403, description = "Only owners can manage permissions"),
        (status = 404, description = "Event not found")
    ),
    tag = "permissions"
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Response> {
    let permissions = state.events.list_permissions(event_id, actor).await?;
    let dtos: Vec<PermissionDto> = permissions.into_iter().map(PermissionDto::from).collect();
    Ok(api_response(
        StatusCode::OK,
        "Permissions retrieved successfully",
        Some(to_json(&dtos)?),
    ))
}

/// POST /v1/events/{event_id}/permissions - Share an event with a user
#[utoipa::path(
    post,
    path = "/v1/events/{event_id}/permissions",
    params(("event_id" = Uuid, Path, description = "Event ID")),
    request_body = ShareRequest,
    responses(
        (status = 201, description = "Event shared successfully", body = crate::common::ApiResponse),
        (status = 400, description = "Duplicate owner or owner demotion"),
        (status = 403, description = "Only owners can manage permissions"),
        (status = 404, description = "Event not found")
    ),
    tag = "permissions"
)]
pub async fn share_event(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(event_id): Path<Uuid>,
    Json(req): Json<ShareRequest>,
) -> ApiResult<Response> {
    let permission = state
        .events
        .share(event_id, req.user_id, req.role, actor)
        .await?;
    Ok(api_response(
        StatusCode::CREATED,
        "Event shared successfully",
        Some(to_json(&PermissionDto::from(permission))?),
    ))
}

/// PUT /v1/events/{event_id}/permissions - Replace the permission set
#[utoipa::path(
    put,
    path = "/v1/events/{event_id}/permissions",
    params(("event_id" = Uuid, Path, description = "Event ID")),
    request_body = ReplacePermissionsRequest,
    responses(
        (status = 200, description = "Permissions updated successfully", body = crate::common::ApiResponse),
        (status = 400, description = "Duplicate owner or owner removal"),
        (status = 403, description = "Only owners can manage permissions"),
        (status = 404, description = "Event not found")
    ),
    tag = "permissions"
)]
pub async fn replace_permissions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(event_id): Path<Uuid>,
    Json(req): Json<ReplacePermissionsRequest>,
) -> ApiResult<Response> {
    let desired = req
        .permissions
        .into_iter()
        .map(|p| (p.user_id, p.role))
        .collect();
    let permissions = state.events.update_permissions(event_id, desired, actor).await?;
    let dtos: Vec<PermissionDto> = permissions.into_iter().map(PermissionDto::from).collect();
    Ok(api_response(
        StatusCode::OK,
        "Permissions updated successfully",
        Some(to_json(&dtos)?),
    ))
}

/// DELETE /v1/events/{event_id}/permissions/{user_id} - Revoke a grant
#[utoipa::path(
    delete,
    path = "/v1/events/{event_id}/permissions/{user_id}",
    params(
        ("event_id" = Uuid, Path, description = "Event ID"),
        ("user_id" = Uuid, Path, description = "User whose grant is revoked")
    ),
    responses(
        (status = 204, description = "Permission revoked successfully"),
        (status = 400, description = "Owner grants cannot be revoked"),
        (status = 403, description = "Only owners can manage permissions"),
        (status = 404, description = "Event not found")
    ),
    tag = "permissions"
)]
pub async fn revoke_permission(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path((event_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state.events.revoke(event_id, user_id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
