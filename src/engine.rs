//! The task lifecycle engine.
//!
//! [`TaskEngine`] is the only writer of task state. Every mutating operation
//! loads, validates, mutates, and records history inside a single store
//! transaction, so a failure at any point leaves the original state intact —
//! including halfway through a cascade.

use crate::error::{Error, Result};
use crate::id::generate_task_id;
use crate::models::{ChangeType, HistoryEntry, Priority, Session, Status, Task};
use crate::store::{NewHistoryEntry, TaskFilter, TaskPatch, TaskStore, TaskTx};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Options for a status transition.
#[derive(Debug, Default, Clone)]
pub struct TransitionOptions {
    /// Why the task is blocked. Required when transitioning to `Blocked`.
    pub reason: Option<String>,
    /// Whether to apply the cascade rules to children.
    pub cascade: bool,
}

impl TransitionOptions {
    /// Options carrying a block reason.
    #[must_use]
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self { reason: Some(reason.into()), cascade: false }
    }

    /// Enable cascading to children.
    #[must_use]
    pub fn cascading(mut self) -> Self {
        self.cascade = true;
        self
    }
}

/// A child transition applied by a cascading parent transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideEffect {
    /// The child task that transitioned.
    pub task_id: String,
    /// Its status before the cascade.
    pub old_status: Status,
    /// Its status after the cascade.
    pub new_status: Status,
}

/// The result of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    /// The task that transitioned.
    pub task_id: String,
    /// Status before the transition.
    pub old_status: Status,
    /// Status after the transition.
    pub new_status: Status,
    /// Child transitions applied by the cascade, in walk order.
    pub side_effects: Vec<SideEffect>,
}

/// How to treat a deletion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteMode {
    /// Refuse to delete a task that has children or dependents.
    Guarded,
    /// Delete regardless; the caller must say what happens to children.
    Forced {
        /// What to do with the task's children.
        children: ChildDisposition,
    },
}

/// What a forced deletion does with the deleted task's children.
///
/// There is deliberately no default: the caller decides every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildDisposition {
    /// Detach the children; they become roots of their own trees.
    Orphan,
    /// Delete the whole subtree.
    Cascade,
}

/// Mechanical (non-lifecycle) field edits.
#[derive(Debug, Default, Clone)]
pub struct TaskEdit {
    /// New title (if Some).
    pub title: Option<String>,
    /// New description (if Some).
    pub description: Option<String>,
    /// New priority (if Some).
    pub priority: Option<Priority>,
}

/// The task lifecycle and dependency engine.
///
/// Generic over the store so the persistence substrate is a swappable
/// collaborator; all lifecycle rules live here.
#[derive(Debug, Clone)]
pub struct TaskEngine<S: TaskStore> {
    store: S,
}

/// Current time as an RFC 3339 string. One value is captured per operation
/// and shared by every timestamp that operation writes.
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Validate a transition without applying it.
///
/// Archive attempts from a non-completed status get the dedicated
/// `ArchiveOfNonCompleted` error rather than the generic table rejection.
pub(crate) fn check_transition(task: &Task, target: Status, reason: Option<&str>) -> Result<()> {
    if target == Status::Archived && task.status != Status::Completed {
        return Err(Error::ArchiveOfNonCompleted { task_id: task.id.clone(), status: task.status });
    }
    if !task.status.can_transition_to(target) {
        return Err(Error::InvalidTransition {
            task_id: task.id.clone(),
            from: task.status,
            to: target,
        });
    }
    if target == Status::Blocked && !reason.is_some_and(|r| !r.trim().is_empty()) {
        return Err(Error::MissingBlockReason(task.id.clone()));
    }
    Ok(())
}

/// Apply a validated status change to one task: patch the status fields and
/// record one history entry per field that actually changed.
fn apply_status_change(
    tx: &mut dyn TaskTx,
    task: &Task,
    target: Status,
    reason: Option<&str>,
    change_type: ChangeType,
    now: &str,
) -> Result<()> {
    let mut patch = TaskPatch {
        status: Some(target),
        updated_at: Some(now.to_string()),
        ..Default::default()
    };
    let mut changes = vec![(
        "status",
        Some(task.status.as_str().to_string()),
        Some(target.as_str().to_string()),
    )];

    match target {
        Status::Blocked => {
            let reason = reason.unwrap_or_default().trim().to_string();
            if task.blocked_reason.as_deref() != Some(reason.as_str()) {
                changes.push(("blocked_reason", task.blocked_reason.clone(), Some(reason.clone())));
            }
            patch.blocked_reason = Some(Some(reason));
        }
        Status::Todo | Status::Active => {
            if task.blocked_reason.is_some() {
                changes.push(("blocked_reason", task.blocked_reason.clone(), None));
                patch.blocked_reason = Some(None);
            }
        }
        Status::Completed => {
            changes.push(("completed_at", task.completed_at.clone(), Some(now.to_string())));
            patch.completed_at = Some(Some(now.to_string()));
            if task.blocked_reason.is_some() {
                changes.push(("blocked_reason", task.blocked_reason.clone(), None));
                patch.blocked_reason = Some(None);
            }
        }
        Status::Paused | Status::Archived => {}
    }

    tx.apply_patch(&task.id, &patch)?;
    for (field_name, old_value, new_value) in changes {
        tx.record_history(&NewHistoryEntry {
            task_id: &task.id,
            field_name,
            old_value,
            new_value,
            change_type,
            timestamp: now,
        })?;
    }
    Ok(())
}

/// Walk the children of `root` depth-first with an explicit stack, applying
/// the cascade rules and collecting each applied child transition.
///
/// Only children that themselves transition have their own children walked.
fn cascade_children(
    tx: &mut dyn TaskTx,
    root: &str,
    parent_target: Status,
    now: &str,
    effects: &mut Vec<SideEffect>,
) -> Result<()> {
    if !matches!(parent_target, Status::Blocked | Status::Archived) {
        return Ok(());
    }

    let mut stack: Vec<(String, Task)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for child in tx.list_children(root)?.into_iter().rev() {
        stack.push((root.to_string(), child));
    }

    while let Some((parent_id, child)) = stack.pop() {
        // The forest invariant makes revisits impossible; the guard keeps a
        // corrupted hierarchy from looping forever
        if !seen.insert(child.id.clone()) {
            continue;
        }

        let target = match (parent_target, child.status) {
            (Status::Blocked, Status::Active | Status::Todo) => Status::Blocked,
            (Status::Archived, Status::Completed) => Status::Archived,
            _ => continue,
        };
        if !child.status.can_transition_to(target) {
            continue;
        }

        let reason = (target == Status::Blocked)
            .then(|| format!("blocked by parent task {parent_id}"));
        apply_status_change(tx, &child, target, reason.as_deref(), ChangeType::Cascade, now)?;
        effects.push(SideEffect {
            task_id: child.id.clone(),
            old_status: child.status,
            new_status: target,
        });

        for grandchild in tx.list_children(&child.id)?.into_iter().rev() {
            stack.push((child.id.clone(), grandchild));
        }
    }
    Ok(())
}

impl<S: TaskStore> TaskEngine<S> {
    /// Create an engine over the given store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Get a task by ID.
    ///
    /// # Errors
    ///
    /// Fails with `TaskNotFound` if the task does not exist.
    pub fn get_task(&self, id: &str) -> Result<Task> {
        self.store.get_task(id)?.ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    /// List tasks matching the filter.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.store.list_tasks(filter)
    }

    /// History entries for a task, oldest first.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn history(&self, id: &str, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        self.store.history_for(id, limit)
    }

    /// Create a task in `todo` with no dependencies.
    ///
    /// # Errors
    ///
    /// Fails with `ParentNotFound` if `parent` does not resolve.
    pub fn create_task(
        &self,
        title: &str,
        description: &str,
        priority: Priority,
        parent: Option<&str>,
    ) -> Result<Task> {
        let now = now_rfc3339();
        let id = generate_task_id(title);

        self.store.with_transaction(|tx| {
            if let Some(parent_id) = parent {
                if tx.get_task(parent_id)?.is_none() {
                    return Err(Error::ParentNotFound(parent_id.to_string()));
                }
            }

            let task = Task {
                id: id.clone(),
                title: title.to_string(),
                description: description.to_string(),
                priority,
                status: Status::Todo,
                parent: parent.map(str::to_string),
                blocked_reason: None,
                completed_at: None,
                created_at: now.clone(),
                updated_at: now.clone(),
            };
            tx.insert_task(&task)?;
            tx.record_history(&NewHistoryEntry {
                task_id: &task.id,
                field_name: "status",
                old_value: None,
                new_value: Some(Status::Todo.as_str().to_string()),
                change_type: ChangeType::Create,
                timestamp: &now,
            })?;
            Ok(task)
        })
    }

    /// Apply mechanical field edits, recording history per changed field.
    ///
    /// # Errors
    ///
    /// Fails with `TaskNotFound` if the task does not exist.
    pub fn update_task(&self, id: &str, edit: &TaskEdit) -> Result<Task> {
        let now = now_rfc3339();

        self.store.with_transaction(|tx| {
            let task = tx.get_task(id)?.ok_or_else(|| Error::TaskNotFound(id.to_string()))?;

            let mut patch = TaskPatch::default();
            let mut changes: Vec<(&str, Option<String>, Option<String>)> = Vec::new();

            if let Some(ref title) = edit.title {
                if *title != task.title {
                    changes.push(("title", Some(task.title.clone()), Some(title.clone())));
                    patch.title = Some(title.clone());
                }
            }
            if let Some(ref description) = edit.description {
                if *description != task.description {
                    changes.push((
                        "description",
                        Some(task.description.clone()),
                        Some(description.clone()),
                    ));
                    patch.description = Some(description.clone());
                }
            }
            if let Some(priority) = edit.priority {
                if priority != task.priority {
                    changes.push((
                        "priority",
                        Some(task.priority.as_u8().to_string()),
                        Some(priority.as_u8().to_string()),
                    ));
                    patch.priority = Some(priority);
                }
            }

            if changes.is_empty() {
                return Ok(task);
            }

            patch.updated_at = Some(now.clone());
            tx.apply_patch(id, &patch)?;
            for (field_name, old_value, new_value) in changes {
                tx.record_history(&NewHistoryEntry {
                    task_id: id,
                    field_name,
                    old_value,
                    new_value,
                    change_type: ChangeType::Update,
                    timestamp: &now,
                })?;
            }
            tx.get_task(id)?.ok_or_else(|| Error::TaskNotFound(id.to_string()))
        })
    }

    /// Transition a task to a new status.
    ///
    /// Validation happens before any write. With `cascade` enabled, the
    /// cascade rules are applied to children inside the same transaction and
    /// every applied child transition is returned as a side effect.
    ///
    /// # Errors
    ///
    /// Fails with `TaskNotFound`, `InvalidTransition`, `MissingBlockReason`,
    /// or `ArchiveOfNonCompleted`; the task is unchanged on failure.
    pub fn transition(
        &self,
        id: &str,
        target: Status,
        opts: &TransitionOptions,
    ) -> Result<TransitionOutcome> {
        let now = now_rfc3339();

        self.store.with_transaction(|tx| {
            let task = tx.get_task(id)?.ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
            check_transition(&task, target, opts.reason.as_deref())?;

            apply_status_change(
                tx,
                &task,
                target,
                opts.reason.as_deref(),
                ChangeType::Update,
                &now,
            )?;

            let mut side_effects = Vec::new();
            if opts.cascade {
                cascade_children(tx, &task.id, target, &now, &mut side_effects)?;
            }

            Ok(TransitionOutcome {
                task_id: task.id,
                old_status: task.status,
                new_status: target,
                side_effects,
            })
        })
    }

    /// Transition the session's active task.
    ///
    /// # Errors
    ///
    /// Fails with `NoActiveTask` if the session has none, otherwise as
    /// [`TaskEngine::transition`].
    pub fn transition_active(
        &self,
        session: &Session,
        target: Status,
        opts: &TransitionOptions,
    ) -> Result<TransitionOutcome> {
        let id = session.active.as_deref().ok_or(Error::NoActiveTask)?;
        self.transition(id, target, opts)
    }

    /// Set or clear a task's parent.
    ///
    /// # Errors
    ///
    /// Fails with `ParentNotFound` for an unknown parent and
    /// `HierarchyCycle` if the task would become its own ancestor.
    pub fn set_parent(&self, id: &str, parent: Option<&str>) -> Result<Task> {
        let now = now_rfc3339();

        self.store.with_transaction(|tx| {
            let task = tx.get_task(id)?.ok_or_else(|| Error::TaskNotFound(id.to_string()))?;

            if let Some(parent_id) = parent {
                if parent_id == id {
                    return Err(Error::HierarchyCycle {
                        task_id: id.to_string(),
                        parent_id: parent_id.to_string(),
                    });
                }
                let parent_task = tx
                    .get_task(parent_id)?
                    .ok_or_else(|| Error::ParentNotFound(parent_id.to_string()))?;

                // Walk the proposed parent's ancestor chain; reaching `id`
                // would close a loop in the forest
                let mut seen: HashSet<String> = HashSet::new();
                let mut cursor = parent_task.parent;
                while let Some(ancestor) = cursor {
                    if ancestor == id {
                        return Err(Error::HierarchyCycle {
                            task_id: id.to_string(),
                            parent_id: parent_id.to_string(),
                        });
                    }
                    if !seen.insert(ancestor.clone()) {
                        break;
                    }
                    cursor = tx.get_task(&ancestor)?.and_then(|t| t.parent);
                }
            }

            if task.parent.as_deref() == parent {
                return Ok(task);
            }

            tx.apply_patch(
                id,
                &TaskPatch {
                    parent: Some(parent.map(str::to_string)),
                    updated_at: Some(now.clone()),
                    ..Default::default()
                },
            )?;
            tx.record_history(&NewHistoryEntry {
                task_id: id,
                field_name: "parent",
                old_value: task.parent.clone(),
                new_value: parent.map(str::to_string),
                change_type: ChangeType::Update,
                timestamp: &now,
            })?;
            tx.get_task(id)?.ok_or_else(|| Error::TaskNotFound(id.to_string()))
        })
    }

    /// Delete a task.
    ///
    /// `Guarded` refuses when children or dependents exist. `Forced` always
    /// deletes and applies the caller-chosen [`ChildDisposition`]; dependency
    /// edges touching deleted tasks go with them.
    ///
    /// # Errors
    ///
    /// Fails with `TaskNotFound`, `HasChildren`, or `HasDependents`.
    pub fn delete_task(&self, id: &str, mode: &DeleteMode) -> Result<()> {
        let now = now_rfc3339();

        self.store.with_transaction(|tx| {
            let task = tx.get_task(id)?.ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
            let children = tx.list_children(id)?;
            let dependents = tx.list_dependents(id)?;

            match mode {
                DeleteMode::Guarded => {
                    if !children.is_empty() {
                        return Err(Error::HasChildren {
                            task_id: id.to_string(),
                            count: children.len(),
                        });
                    }
                    if !dependents.is_empty() {
                        return Err(Error::HasDependents {
                            task_id: id.to_string(),
                            count: dependents.len(),
                        });
                    }
                    tx.delete_task(id)
                }
                DeleteMode::Forced { children: ChildDisposition::Orphan } => {
                    for child in &children {
                        tx.apply_patch(
                            &child.id,
                            &TaskPatch {
                                parent: Some(None),
                                updated_at: Some(now.clone()),
                                ..Default::default()
                            },
                        )?;
                        tx.record_history(&NewHistoryEntry {
                            task_id: &child.id,
                            field_name: "parent",
                            old_value: Some(task.id.clone()),
                            new_value: None,
                            change_type: ChangeType::Update,
                            timestamp: &now,
                        })?;
                    }
                    tx.delete_task(id)
                }
                DeleteMode::Forced { children: ChildDisposition::Cascade } => {
                    // Collect the subtree pre-order, then delete in reverse
                    // so every child goes before its parent
                    let mut order = Vec::new();
                    let mut seen: HashSet<String> = HashSet::new();
                    let mut stack = vec![id.to_string()];
                    while let Some(current) = stack.pop() {
                        if !seen.insert(current.clone()) {
                            continue;
                        }
                        for child in tx.list_children(&current)? {
                            stack.push(child.id);
                        }
                        order.push(current);
                    }
                    for victim in order.iter().rev() {
                        tx.delete_task(victim)?;
                    }
                    Ok(())
                }
            }
        })
    }
}
