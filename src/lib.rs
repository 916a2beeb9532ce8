//! # `taskflow`
//!
//! A task lifecycle and dependency engine: a closed status state machine
//! with cascading parent-to-child transitions, an acyclic dependency graph
//! with readiness queries, and a per-field change history, all persisted in
//! `SQLite`.

pub mod bulk;
pub mod engine;
pub mod error;
pub mod graph;
pub mod id;
pub mod models;
pub mod store;

pub use bulk::{
    validate_bulk_transitions, validate_from_json, BulkTransitionInput, BulkTransitionReport,
    TransitionChange, TransitionCheck,
};
pub use engine::{
    ChildDisposition, DeleteMode, SideEffect, TaskEdit, TaskEngine, TransitionOptions,
    TransitionOutcome,
};
pub use error::{Error, Result};
pub use graph::DependencyNode;
pub use models::{ChangeType, HistoryEntry, Priority, Session, Status, Task};
pub use store::{SqliteTaskStore, TaskFilter, TaskStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
