// Acting user, as supplied by the external identity provider
//
// The core never issues or validates credentials; it receives an opaque
// actor per request and only cares about its id and superuser bit.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user performing an operation.
///
/// Superusers bypass all per-event permission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub is_superuser: bool,
}

impl Actor {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            is_superuser: false,
        }
    }

    pub fn superuser(id: Uuid) -> Self {
        Self {
            id,
            is_superuser: true,
        }
    }
}
