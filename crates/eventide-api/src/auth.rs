// Actor extraction
//
// Identity is an external collaborator: an upstream gateway authenticates
// the request and forwards the opaque actor in headers. This extractor only
// parses those headers; it never validates credentials.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Response;
use uuid::Uuid;

use eventide_core::Actor;

use crate::common::api_response;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_SUPERUSER_HEADER: &str = "x-actor-superuser";

/// The authenticated actor for this request
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| {
                api_response(
                    StatusCode::UNAUTHORIZED,
                    "Missing or invalid actor identity",
                    None,
                )
            })?;

        let is_superuser = parts
            .headers
            .get(ACTOR_SUPERUSER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(CurrentActor(Actor { id, is_superuser }))
    }
}
