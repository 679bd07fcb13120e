// Event scheduling domain core
//
// This crate provides the DB-agnostic half of the scheduling engine:
// - Event snapshots, drafts and patches (version chains are append-only)
// - Role-based permission table (owner/editor/viewer)
// - Changelog diff computation and multi-entry aggregation
// - Interval-overlap conflict detection and alternative-slot probing
// - Recurrence expansion (fixed-step arithmetic: monthly = 30 days)
//
// Key design decisions:
// - Persistence and transaction boundaries live in eventide-storage; every
//   algorithm here is a pure function over domain values
// - The realtime transport is behind the RealtimeSink trait (best-effort)
// - Errors are a closed taxonomy (EventideError); storage failures fold into
//   the Internal variant

pub mod actor;
pub mod changelog;
pub mod conflict;
pub mod error;
pub mod event;
pub mod permission;
pub mod recurrence;
pub mod traits;

// Re-exports for convenience
pub use actor::Actor;
pub use changelog::{aggregate_diffs, diff, ChangeType, Diff, FieldChange};
pub use conflict::{suggest_slots, ConflictingEvent, Interval, MAX_SLOT_PROBES, SUGGESTION_COUNT};
pub use error::{EventideError, Result};
pub use event::{Event, EventDraft, EventPatch, RecurrencePattern};
pub use permission::{Action, Role};
pub use recurrence::{expand, InstanceSlot};
pub use traits::{NoopSink, RealtimeSink};
