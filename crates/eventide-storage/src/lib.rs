// Postgres storage layer with sqlx
//
// This crate provides the persistence half of the scheduling engine:
// - Database: pool wrapper, migrations, transaction handles
// - repositories: row-level queries, composable into transactions
// - version_store: atomic supersede/append version-chain operations
// - EventService: the single transactional orchestration entry point

pub mod event_service;
pub mod models;
pub mod repositories;
pub mod version_store;

pub use event_service::EventService;
pub use models::{ChangeLogEntry, EventFilter, EventPermission};
pub use repositories::Database;
