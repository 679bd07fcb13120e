// Error types for the scheduling engine

use thiserror::Error;
use uuid::Uuid;

use crate::conflict::{ConflictingEvent, Interval};

/// Result type alias for scheduling operations
pub type Result<T> = std::result::Result<T, EventideError>;

/// Errors that can occur while mutating or querying events.
///
/// Every variant except `Internal` leaves persisted state untouched: the
/// storage layer rolls the surrounding transaction back before surfacing it.
#[derive(Debug, Error)]
pub enum EventideError {
    /// Malformed input (date ordering, missing recurrence pattern, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// Actor lacks the role required for the attempted action
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Event not found
    #[error("event not found: {0}")]
    EventNotFound(Uuid),

    /// Requested version does not exist in the lineage
    #[error("version {version} not found for event {event_id}")]
    VersionNotFound { event_id: Uuid, version: i32 },

    /// Version creation attempted from a superseded row
    #[error("versions can only be created from the latest version")]
    NotLatest,

    /// A second owner permission was attempted for an event
    #[error("event already has an owner")]
    DuplicateOwner,

    /// The owner permission may never be removed while the event exists
    #[error("the owner permission cannot be removed")]
    CannotRemoveOwner,

    /// The candidate interval overlaps existing events; carries the
    /// conflicting events and alternative-slot suggestions so callers can
    /// act on the rejection
    #[error("schedule conflict with {} existing event(s)", conflicts.len())]
    Conflict {
        conflicts: Vec<ConflictingEvent>,
        suggestions: Vec<Interval>,
    },

    /// Alternative-slot probing hit its bound without finding enough free slots
    #[error("no free slot found within {0} probes")]
    SuggestionExhausted(u32),

    /// Internal error (storage and other unexpected failures)
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EventideError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        EventideError::Validation(msg.into())
    }

    /// Create a permission-denied error
    pub fn denied(msg: impl Into<String>) -> Self {
        EventideError::PermissionDenied(msg.into())
    }

    /// Create a version-not-found error
    pub fn version_not_found(event_id: Uuid, version: i32) -> Self {
        EventideError::VersionNotFound { event_id, version }
    }
}
