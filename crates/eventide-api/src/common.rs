// Response envelope and error mapping for the public API
//
// Every endpoint answers with `{status, message, data}`; the error taxonomy
// maps onto standard status codes, with conflicts carrying their structured
// suggestions payload in `data`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use eventide_core::EventideError;

/// Standard response wrapper: `{status, message, data}`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse {
    /// HTTP status code echoed in the body.
    #[schema(example = 200)]
    pub status: u16,
    /// Human-readable outcome description.
    #[schema(example = "Event retrieved successfully")]
    pub message: String,
    /// Operation payload; null on errors without structured detail.
    #[schema(value_type = Object, nullable)]
    pub data: Option<Value>,
}

/// Build an enveloped response with the given status code.
pub fn api_response(
    code: StatusCode,
    message: impl Into<String>,
    data: Option<Value>,
) -> Response {
    let body = ApiResponse {
        status: code.as_u16(),
        message: message.into(),
        data,
    };
    (code, Json(body)).into_response()
}

/// Error wrapper implementing the taxonomy -> HTTP mapping
#[derive(Debug)]
pub struct ApiError(pub EventideError);

impl From<EventideError> for ApiError {
    fn from(err: EventideError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        match &err {
            EventideError::Validation(_)
            | EventideError::DuplicateOwner
            | EventideError::CannotRemoveOwner
            | EventideError::NotLatest => {
                api_response(StatusCode::BAD_REQUEST, err.to_string(), None)
            }
            EventideError::PermissionDenied(_) => {
                api_response(StatusCode::FORBIDDEN, err.to_string(), None)
            }
            EventideError::EventNotFound(_) | EventideError::VersionNotFound { .. } => {
                api_response(StatusCode::NOT_FOUND, err.to_string(), None)
            }
            EventideError::Conflict {
                conflicts,
                suggestions,
            } => api_response(
                StatusCode::CONFLICT,
                err.to_string(),
                Some(json!({ "conflicts": conflicts, "suggestions": suggestions })),
            ),
            EventideError::SuggestionExhausted(_) => {
                api_response(StatusCode::CONFLICT, err.to_string(), None)
            }
            EventideError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                api_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred",
                    None,
                )
            }
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_status_message_data() {
        let body = ApiResponse {
            status: 201,
            message: "Event created successfully".into(),
            data: Some(json!({"id": 1})),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["status"], json!(201));
        assert_eq!(value["data"]["id"], json!(1));
    }

    #[test]
    fn conflict_maps_to_409_with_payload() {
        let err = ApiError(EventideError::Conflict {
            conflicts: vec![],
            suggestions: vec![],
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn taxonomy_maps_to_expected_codes() {
        let cases = [
            (
                EventideError::validation("bad dates"),
                StatusCode::BAD_REQUEST,
            ),
            (
                EventideError::denied("nope"),
                StatusCode::FORBIDDEN,
            ),
            (
                EventideError::EventNotFound(uuid::Uuid::now_v7()),
                StatusCode::NOT_FOUND,
            ),
            (EventideError::DuplicateOwner, StatusCode::BAD_REQUEST),
            (EventideError::CannotRemoveOwner, StatusCode::BAD_REQUEST),
            (EventideError::NotLatest, StatusCode::BAD_REQUEST),
            (
                EventideError::SuggestionExhausted(96),
                StatusCode::CONFLICT,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError(err).into_response().status(), code);
        }
    }
}
