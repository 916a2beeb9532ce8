//! Core model types: tasks, statuses, priorities, and history entries.

use serde::{Deserialize, Serialize};

/// Task priority levels (0 = most important).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    /// Critical priority - blocking issues.
    Critical = 0,
    /// High priority.
    High = 1,
    /// Medium priority (default).
    #[default]
    Medium = 2,
    /// Low priority.
    Low = 3,
    /// Backlog - future work.
    Backlog = 4,
}

impl Priority {
    /// Create a priority from a numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is greater than 4.
    pub const fn from_u8(value: u8) -> Result<Self, InvalidPriority> {
        match value {
            0 => Ok(Self::Critical),
            1 => Ok(Self::High),
            2 => Ok(Self::Medium),
            3 => Ok(Self::Low),
            4 => Ok(Self::Backlog),
            _ => Err(InvalidPriority(value)),
        }
    }

    /// Get the numeric value of the priority.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Error when an invalid priority value is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPriority(pub u8);

impl std::fmt::Display for InvalidPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid priority: {} (must be 0-4)", self.0)
    }
}

impl std::error::Error for InvalidPriority {}

/// Task lifecycle status.
///
/// Statuses form a closed state machine; the allowed moves are encoded in
/// [`Status::can_transition_to`] and nothing outside that table is ever
/// applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Task has not been started.
    #[default]
    Todo,
    /// Task is being worked on.
    Active,
    /// Work on the task is paused.
    Paused,
    /// Task cannot proceed; `blocked_reason` says why.
    Blocked,
    /// Task is done; `completed_at` records when.
    Completed,
    /// Task is archived. Terminal.
    Archived,
}

impl Status {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] =
        [Self::Todo, Self::Active, Self::Paused, Self::Blocked, Self::Completed, Self::Archived];

    /// Parse a status from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid status.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidStatus> {
        match s.to_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "blocked" => Ok(Self::Blocked),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            _ => Err(InvalidStatus(s.to_string())),
        }
    }

    /// Get the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    /// Whether a direct transition from `self` to `target` is allowed.
    ///
    /// Archiving is only reachable from `Completed`; `Archived` is terminal.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Todo, Self::Active | Self::Blocked | Self::Completed)
                | (Self::Active, Self::Paused | Self::Blocked | Self::Completed)
                | (Self::Paused, Self::Active | Self::Blocked | Self::Completed)
                | (Self::Blocked, Self::Todo | Self::Active | Self::Completed)
                | (Self::Completed, Self::Archived)
        )
    }

    /// Check if the status has no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Archived)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid status string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatus(pub String);

impl std::fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid status: '{}' (must be one of: todo, active, paused, blocked, completed, archived)",
            self.0
        )
    }
}

impl std::error::Error for InvalidStatus {}

/// A task in the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (slug from title + random hex suffix).
    pub id: String,
    /// Short title describing the task.
    pub title: String,
    /// Detailed description of the task.
    pub description: String,
    /// Priority level (0-4, lower is more important).
    pub priority: Priority,
    /// Current lifecycle status.
    pub status: Status,
    /// ID of the parent task, if any. Parents form a forest.
    pub parent: Option<String>,
    /// Why the task is blocked. Set exactly when `status` is `Blocked`.
    pub blocked_reason: Option<String>,
    /// RFC 3339 timestamp of completion. Set once the task completes.
    pub completed_at: Option<String>,
    /// RFC 3339 timestamp when the task was created.
    pub created_at: String,
    /// RFC 3339 timestamp when the task was last updated.
    pub updated_at: String,
}

impl Task {
    /// Check if the task has been archived (terminal state).
    #[must_use]
    pub const fn is_archived(&self) -> bool {
        matches!(self.status, Status::Archived)
    }
}

/// What kind of mutation produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Task creation.
    Create,
    /// A directly requested field change.
    Update,
    /// A field change applied to a child by a cascading transition.
    Cascade,
    /// A dependency edge was added.
    DependencyAdded,
    /// A dependency edge was removed.
    DependencyRemoved,
}

impl ChangeType {
    /// Parse a change type from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid change type.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidChangeType> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "cascade" => Ok(Self::Cascade),
            "dependency_added" => Ok(Self::DependencyAdded),
            "dependency_removed" => Ok(Self::DependencyRemoved),
            _ => Err(InvalidChangeType(s.to_string())),
        }
    }

    /// Get the string representation of the change type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Cascade => "cascade",
            Self::DependencyAdded => "dependency_added",
            Self::DependencyRemoved => "dependency_removed",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid change type string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidChangeType(pub String);

impl std::fmt::Display for InvalidChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid change type: '{}'", self.0)
    }
}

impl std::error::Error for InvalidChangeType {}

/// An immutable audit record of one field change on one task.
///
/// Entries are appended in the same transaction as the mutation that caused
/// them and are only ever read afterwards. They are owned by their task and
/// deleted with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique identifier for the entry.
    pub id: i64,
    /// ID of the task this entry belongs to.
    pub task_id: String,
    /// Name of the field that changed.
    pub field_name: String,
    /// Value before the change, if any.
    pub old_value: Option<String>,
    /// Value after the change, if any.
    pub new_value: Option<String>,
    /// What kind of mutation caused the change.
    pub change_type: ChangeType,
    /// RFC 3339 timestamp when the change happened.
    pub timestamp: String,
}

/// Explicit session context: which task the caller is currently working on.
///
/// Passed into calls instead of living in ambient process state, so the
/// engine itself stays free of hidden globals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// ID of the task actively being worked on, if any.
    pub active: Option<String>,
}

impl Session {
    /// A session with no active task.
    #[must_use]
    pub const fn idle() -> Self {
        Self { active: None }
    }

    /// A session working on the given task.
    #[must_use]
    pub fn working_on(task_id: impl Into<String>) -> Self {
        Self { active: Some(task_id.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_priority_round_trip() {
        for value in 0..=4 {
            assert_eq!(Priority::from_u8(value).unwrap().as_u8(), value);
        }
        assert!(Priority::from_u8(5).is_err());
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(Status::from_str("todo").unwrap(), Status::Todo);
        assert_eq!(Status::from_str("TODO").unwrap(), Status::Todo);
        assert_eq!(Status::from_str("active").unwrap(), Status::Active);
        assert_eq!(Status::from_str("paused").unwrap(), Status::Paused);
        assert_eq!(Status::from_str("blocked").unwrap(), Status::Blocked);
        assert_eq!(Status::from_str("completed").unwrap(), Status::Completed);
        assert_eq!(Status::from_str("archived").unwrap(), Status::Archived);
        assert!(Status::from_str("done").is_err());
    }

    #[test]
    fn test_status_display_round_trip() {
        for status in Status::ALL {
            assert_eq!(Status::from_str(&status.to_string()).unwrap(), status);
        }
    }

    #[test]
    fn test_status_default() {
        assert_eq!(Status::default(), Status::Todo);
    }

    #[test]
    fn test_transition_table() {
        use Status::{Active, Archived, Blocked, Completed, Paused, Todo};

        let allowed = [
            (Todo, Active),
            (Todo, Blocked),
            (Todo, Completed),
            (Active, Paused),
            (Active, Blocked),
            (Active, Completed),
            (Paused, Active),
            (Paused, Blocked),
            (Paused, Completed),
            (Blocked, Todo),
            (Blocked, Active),
            (Blocked, Completed),
            (Completed, Archived),
        ];

        for from in Status::ALL {
            for to in Status::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "table disagrees for {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_archived_is_terminal() {
        assert!(Status::Archived.is_terminal());
        for status in Status::ALL {
            assert!(!Status::Archived.can_transition_to(status));
        }
    }

    #[test]
    fn test_change_type_round_trip() {
        for change_type in [
            ChangeType::Create,
            ChangeType::Update,
            ChangeType::Cascade,
            ChangeType::DependencyAdded,
            ChangeType::DependencyRemoved,
        ] {
            assert_eq!(ChangeType::from_str(change_type.as_str()).unwrap(), change_type);
        }
        assert!(ChangeType::from_str("merge").is_err());
    }

    #[test]
    fn test_task_serialization() {
        let task = Task {
            id: "fix-login-1a2b3c".to_string(),
            title: "Fix login".to_string(),
            description: "OAuth users cannot log in".to_string(),
            priority: Priority::High,
            status: Status::Blocked,
            parent: Some("auth-rework-9f8e7d".to_string()),
            blocked_reason: Some("waiting on credentials".to_string()),
            completed_at: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-02T00:00:00Z".to_string(),
        };

        let json = serde_json::to_string(&task).unwrap();
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn test_history_entry_serialization() {
        let entry = HistoryEntry {
            id: 1,
            task_id: "fix-login-1a2b3c".to_string(),
            field_name: "status".to_string(),
            old_value: Some("todo".to_string()),
            new_value: Some("active".to_string()),
            change_type: ChangeType::Update,
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"change_type\":\"update\""));
        let parsed: HistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_session() {
        assert_eq!(Session::idle().active, None);
        assert_eq!(Session::working_on("fix-login-1a2b3c").active.as_deref(), Some("fix-login-1a2b3c"));
        assert_eq!(Session::default(), Session::idle());
    }

    fn any_status() -> impl Strategy<Value = Status> {
        prop::sample::select(Status::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_no_self_transitions(status in any_status()) {
            prop_assert!(!status.can_transition_to(status));
        }

        #[test]
        fn prop_archive_only_from_completed(from in any_status()) {
            prop_assert_eq!(
                from.can_transition_to(Status::Archived),
                from == Status::Completed
            );
        }

        #[test]
        fn prop_nothing_leaves_archived(to in any_status()) {
            prop_assert!(!Status::Archived.can_transition_to(to));
        }
    }
}
