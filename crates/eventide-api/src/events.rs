// Event CRUD HTTP routes

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use eventide_core::{Event, EventDraft, EventPatch, EventideError};
use eventide_storage::EventFilter;

use crate::auth::CurrentActor;
use crate::common::{api_response, ApiError, ApiResult};
use crate::AppState;

// ============================================
// DTOs
// ============================================

/// Public representation of one event version
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventDto {
    pub id: Uuid,
    #[schema(example = "Sprint planning")]
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
    #[schema(example = "weekly")]
    pub recurrence_pattern: Option<String>,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    #[schema(value_type = Object, nullable)]
    pub custom_recurrence: Option<Value>,
    pub parent_event: Option<Uuid>,
    pub participants: Vec<Uuid>,
}

impl From<Event> for EventDto {
    fn from(event: Event) -> Self {
        EventDto {
            id: event.id,
            title: event.title,
            description: event.description,
            start_date: event.start_date,
            end_date: event.end_date,
            location: event.location,
            owner_id: event.owner_id,
            created_by: event.created_by,
            updated_by: event.updated_by,
            created_at: event.created_at,
            updated_at: event.updated_at,
            version: event.version,
            is_latest: event.is_latest,
            parent_version: event.parent_version,
            is_recurring: event.is_recurring,
            recurrence_pattern: event.recurrence_pattern.map(|p| p.as_str().to_string()),
            recurrence_end_date: event.recurrence_end_date,
            custom_recurrence: event.custom_recurrence,
            parent_event: event.parent_event,
            participants: event.participants,
        }
    }
}

/// Request to create an event
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    #[schema(example = "Sprint planning")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub is_recurring: bool,
    /// daily | weekly | monthly | yearly | custom
    #[serde(default)]
    #[schema(example = "weekly")]
    pub recurrence_pattern: Option<String>,
    #[serde(default)]
    pub recurrence_end_date: Option<DateTime<Utc>>,
    /// `{interval, unit}` spec for the custom pattern
    #[serde(default)]
    #[schema(value_type = Object, nullable)]
    pub custom_recurrence: Option<Value>,
    #[serde(default)]
    pub participants: Vec<Uuid>,
    /// Create even when the slot conflicts with existing events
    #[serde(default)]
    pub force_create: bool,
}

impl CreateEventRequest {
    fn into_draft(self) -> Result<EventDraft, EventideError> {
        let recurrence_pattern = self
            .recurrence_pattern
            .as_deref()
            .map(str::parse)
            .transpose()?;
        Ok(EventDraft {
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            location: self.location,
            is_recurring: self.is_recurring,
            recurrence_pattern,
            recurrence_end_date: self.recurrence_end_date,
            custom_recurrence: self.custom_recurrence,
            participants: self.participants,
            force_create: self.force_create,
        })
    }
}

/// Request to update an event. Only provided fields are applied; a request
/// that changes nothing is a no-op.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub is_recurring: Option<bool>,
    #[schema(example = "daily")]
    pub recurrence_pattern: Option<String>,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    #[schema(value_type = Object, nullable)]
    pub custom_recurrence: Option<Value>,
}

impl UpdateEventRequest {
    fn into_patch(self) -> Result<EventPatch, EventideError> {
        let recurrence_pattern = self
            .recurrence_pattern
            .as_deref()
            .map(str::parse)
            .transpose()?;
        Ok(EventPatch {
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            location: self.location,
            is_recurring: self.is_recurring,
            recurrence_pattern,
            recurrence_end_date: self.recurrence_end_date,
            custom_recurrence: self.custom_recurrence,
        })
    }
}

/// Request to create several events atomically
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BatchCreateRequest {
    pub events: Vec<CreateEventRequest>,
}

/// Query parameters for the event list
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListEventsQuery {
    /// Only events starting at or after this instant.
    pub start_date: Option<DateTime<Utc>>,
    /// Only events ending at or before this instant.
    pub end_date: Option<DateTime<Utc>>,
    /// 1-based page number.
    pub page: Option<i64>,
    /// Page size, capped at 100.
    pub page_size: Option<i64>,
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| ApiError(EventideError::Internal(anyhow::Error::from(e))))
}

// ============================================
// Routes
// ============================================

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/events", post(create_event).get(list_events))
        .route("/v1/events/batch", post(batch_create))
        .route(
            "/v1/events/:event_id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .with_state(state)
}

/// POST /v1/events - Create a new event
#[utoipa::path(
    post,
    path = "/v1/events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created successfully", body = crate::common::ApiResponse),
        (status = 400, description = "Invalid data"),
        (status = 409, description = "Schedule conflict; data carries conflicting events and suggested slots")
    ),
    tag = "events"
)]
pub async fn create_event(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<CreateEventRequest>,
) -> ApiResult<Response> {
    let draft = req.into_draft()?;
    let event = state.events.create(draft, actor).await?;
    Ok(api_response(
        StatusCode::CREATED,
        "Event created successfully",
        Some(to_json(&EventDto::from(event))?),
    ))
}

/// GET /v1/events - List events visible to the actor
#[utoipa::path(
    get,
    path = "/v1/events",
    params(ListEventsQuery),
    responses(
        (status = 200, description = "Events retrieved successfully", body = crate::common::ApiResponse)
    ),
    tag = "events"
)]
pub async fn list_events(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<ListEventsQuery>,
) -> ApiResult<Response> {
    let filter = EventFilter {
        start_date: query.start_date,
        end_date: query.end_date,
        page: query.page,
        page_size: query.page_size,
    };
    let events = state.events.list(actor, filter).await?;
    let dtos: Vec<EventDto> = events.into_iter().map(EventDto::from).collect();
    Ok(api_response(
        StatusCode::OK,
        "Events retrieved successfully",
        Some(to_json(&dtos)?),
    ))
}

/// POST /v1/events/batch - Create several events in one transaction
#[utoipa::path(
    post,
    path = "/v1/events/batch",
    request_body = BatchCreateRequest,
    responses(
        (status = 201, description = "Events created successfully", body = crate::common::ApiResponse),
        (status = 409, description = "A conflict rolled the whole batch back")
    ),
    tag = "events"
)]
pub async fn batch_create(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<BatchCreateRequest>,
) -> ApiResult<Response> {
    let drafts = req
        .events
        .into_iter()
        .map(CreateEventRequest::into_draft)
        .collect::<Result<Vec<_>, _>>()?;
    let events = state.events.batch_create(drafts, actor).await?;
    let dtos: Vec<EventDto> = events.into_iter().map(EventDto::from).collect();
    Ok(api_response(
        StatusCode::CREATED,
        "Events created successfully",
        Some(to_json(&dtos)?),
    ))
}

/// GET /v1/events/{event_id} - Latest version of an event
#[utoipa::path(
    get,
    path = "/v1/events/{event_id}",
    params(("event_id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event retrieved successfully", body = crate::common::ApiResponse),
        (status = 403, description = "No view permission"),
        (status = 404, description = "Event not found")
    ),
    tag = "events"
)]
pub async fn get_event(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Response> {
    let event = state.events.get(event_id, actor).await?;
    Ok(api_response(
        StatusCode::OK,
        "Event retrieved successfully",
        Some(to_json(&EventDto::from(event))?),
    ))
}

/// PUT /v1/events/{event_id} - Update an event (creates a new version)
#[utoipa::path(
    put,
    path = "/v1/events/{event_id}",
    params(("event_id" = Uuid, Path, description = "Event ID")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated successfully", body = crate::common::ApiResponse),
        (status = 403, description = "No edit permission"),
        (status = 404, description = "Event not found")
    ),
    tag = "events"
)]
pub async fn update_event(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(event_id): Path<Uuid>,
    Json(req): Json<UpdateEventRequest>,
) -> ApiResult<Response> {
    let patch = req.into_patch()?;
    let event = state.events.update(event_id, patch, actor).await?;
    Ok(api_response(
        StatusCode::OK,
        "Event updated successfully",
        Some(to_json(&EventDto::from(event))?),
    ))
}

/// DELETE /v1/events/{event_id} - Delete an event lineage
#[utoipa::path(
    delete,
    path = "/v1/events/{event_id}",
    params(("event_id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Event deleted successfully"),
        (status = 403, description = "Only the owner can delete"),
        (status = 404, description = "Event not found")
    ),
    tag = "events"
)]
pub async fn delete_event(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(event_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.events.delete(event_id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
