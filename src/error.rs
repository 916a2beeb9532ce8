//! Error types for `taskflow`.
//!
//! Every validation failure is raised before any write, so a returned error
//! always means the task and graph are unchanged.

use crate::models::{InvalidChangeType, InvalidPriority, InvalidStatus, Status};

/// Errors that can occur in the lifecycle engine and its store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The referenced task does not exist.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// The requested status change is not in the transition table.
    #[error("invalid transition for {task_id}: {from} -> {to}")]
    InvalidTransition {
        /// The task being transitioned.
        task_id: String,
        /// Its current status.
        from: Status,
        /// The requested status.
        to: Status,
    },

    /// A transition to `blocked` was requested without a reason.
    #[error("cannot block {0} without a non-empty reason")]
    MissingBlockReason(String),

    /// An archive was requested on a task that is not completed.
    #[error("cannot archive {task_id}: status is {status}, only completed tasks can be archived")]
    ArchiveOfNonCompleted {
        /// The task being archived.
        task_id: String,
        /// Its current status.
        status: Status,
    },

    /// Adding the dependency edge would close a cycle.
    #[error("dependency {task_id} -> {depends_on} would create a cycle")]
    CircularDependency {
        /// The task that would gain the dependency.
        task_id: String,
        /// The task it would depend on.
        depends_on: String,
    },

    /// The dependency target does not exist.
    #[error("dependency target not found: {0}")]
    DependencyNotFound(String),

    /// The referenced parent task does not exist.
    #[error("parent not found: {0}")]
    ParentNotFound(String),

    /// Setting the parent would make the task its own ancestor.
    #[error("cannot make {parent_id} the parent of {task_id}: {task_id} would become its own ancestor")]
    HierarchyCycle {
        /// The task whose parent is being set.
        task_id: String,
        /// The proposed parent.
        parent_id: String,
    },

    /// The task cannot be deleted because other tasks depend on it.
    #[error("task {task_id} has {count} dependent task(s); remove the edges or force deletion")]
    HasDependents {
        /// The task being deleted.
        task_id: String,
        /// How many tasks depend on it.
        count: usize,
    },

    /// The task cannot be deleted because it has children.
    #[error("task {task_id} has {count} child task(s); detach the children or force deletion")]
    HasChildren {
        /// The task being deleted.
        task_id: String,
        /// How many children it has.
        count: usize,
    },

    /// A session-scoped operation was called with no active task.
    #[error("session has no active task")]
    NoActiveTask,

    /// An invalid status string was supplied.
    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatus),

    /// An invalid priority value was supplied.
    #[error(transparent)]
    InvalidPriority(#[from] InvalidPriority),

    /// An invalid change type string was supplied.
    #[error(transparent)]
    InvalidChangeType(#[from] InvalidChangeType),

    /// A `SQLite` database error occurred.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
