//! SQLite storage layer for Prime Directive.
//!
//! - WAL mode, foreign keys enforced
//! - One IMMEDIATE transaction per logical unit
//! - Append-only event and AI usage logs
//!
//! # Submodules
//!
//! - [`events`] - Event log storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod schema;
pub mod sqlite;

pub use events::{time_to_commit, Event, EventType};
pub use sqlite::{MutationContext, SqliteStorage};
