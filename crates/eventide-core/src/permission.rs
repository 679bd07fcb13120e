// Per-event role model
//
// Roles are a flat capability table, not per-role behavior objects: the
// {role, action} -> bool mapping below is the complete rule set and is
// exhaustively tested.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EventideError;

/// Role a user holds on a single event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

/// Action gated by the role table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Edit,
    Delete,
    ManagePermissions,
}

impl Role {
    /// Capability table: owner -> everything, editor -> view + edit,
    /// viewer -> view only.
    pub fn allows(self, action: Action) -> bool {
        match (self, action) {
            (Role::Owner, _) => true,
            (Role::Editor, Action::View) | (Role::Editor, Action::Edit) => true,
            (Role::Editor, _) => false,
            (Role::Viewer, Action::View) => true,
            (Role::Viewer, _) => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = EventideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "editor" => Ok(Role::Editor),
            "viewer" => Ok(Role::Viewer),
            other => Err(EventideError::validation(format!(
                "unknown role: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIONS: [Action; 4] = [
        Action::View,
        Action::Edit,
        Action::Delete,
        Action::ManagePermissions,
    ];

    #[test]
    fn owner_allows_everything() {
        for action in ALL_ACTIONS {
            assert!(Role::Owner.allows(action));
        }
    }

    #[test]
    fn editor_allows_view_and_edit_only() {
        assert!(Role::Editor.allows(Action::View));
        assert!(Role::Editor.allows(Action::Edit));
        assert!(!Role::Editor.allows(Action::Delete));
        assert!(!Role::Editor.allows(Action::ManagePermissions));
    }

    #[test]
    fn viewer_allows_view_only() {
        assert!(Role::Viewer.allows(Action::View));
        assert!(!Role::Viewer.allows(Action::Edit));
        assert!(!Role::Viewer.allows(Action::Delete));
        assert!(!Role::Viewer.allows(Action::ManagePermissions));
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Owner, Role::Editor, Role::Viewer] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }
}
