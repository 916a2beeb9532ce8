//! Dependency graph operations.
//!
//! Edges live in the store; this module keeps the graph acyclic and answers
//! the two questions callers ask of it: what does a task transitively depend
//! on, and which tasks are ready to work on.

use crate::engine::{now_rfc3339, TaskEngine};
use crate::error::{Error, Result};
use crate::models::{ChangeType, Status, Task};
use crate::store::{NewHistoryEntry, TaskFilter, TaskStore, TaskTx};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One node of an expanded dependency tree.
///
/// A `Missing` leaf stands in for an edge whose target no longer resolves,
/// so a stale graph renders instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DependencyNode {
    /// A resolved task and its own dependencies.
    Task {
        /// The task at this node.
        task: Task,
        /// Expanded subtrees for each dependency, in edge order.
        dependencies: Vec<DependencyNode>,
    },
    /// An edge target that does not resolve to a task.
    Missing {
        /// The unresolvable task ID.
        id: String,
    },
}

/// Check whether `goal` is reachable from `from` along dependency edges.
///
/// Iterative depth-first search with a visited set, so shared subgraphs are
/// walked once and the search terminates even on a corrupted cyclic graph.
fn reaches(tx: &mut dyn TaskTx, from: &str, goal: &str) -> Result<bool> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack = vec![from.to_string()];

    while let Some(current) = stack.pop() {
        if current == goal {
            return Ok(true);
        }
        if !visited.insert(current.clone()) {
            continue;
        }
        for dep in tx.list_dependencies(&current)? {
            stack.push(dep);
        }
    }
    Ok(false)
}

impl<S: TaskStore> TaskEngine<S> {
    /// Add a dependency edge: `task_id` depends on `depends_on`.
    ///
    /// Returns `false` if the edge already existed. The cycle check runs in
    /// the same transaction as the insert, so a concurrent writer cannot
    /// sneak a cycle in between.
    ///
    /// # Errors
    ///
    /// Fails with `TaskNotFound` for an unknown task, `DependencyNotFound`
    /// for an unknown target, and `CircularDependency` if the edge would
    /// close a cycle (self-dependencies included).
    pub fn add_dependency(&self, task_id: &str, depends_on: &str) -> Result<bool> {
        if task_id == depends_on {
            return Err(Error::CircularDependency {
                task_id: task_id.to_string(),
                depends_on: depends_on.to_string(),
            });
        }
        let now = now_rfc3339();

        self.store().with_transaction(|tx| {
            if tx.get_task(task_id)?.is_none() {
                return Err(Error::TaskNotFound(task_id.to_string()));
            }
            if tx.get_task(depends_on)?.is_none() {
                return Err(Error::DependencyNotFound(depends_on.to_string()));
            }
            if reaches(tx, depends_on, task_id)? {
                return Err(Error::CircularDependency {
                    task_id: task_id.to_string(),
                    depends_on: depends_on.to_string(),
                });
            }

            let added = tx.insert_edge(task_id, depends_on)?;
            if added {
                tx.record_history(&NewHistoryEntry {
                    task_id,
                    field_name: "dependencies",
                    old_value: None,
                    new_value: Some(depends_on.to_string()),
                    change_type: ChangeType::DependencyAdded,
                    timestamp: &now,
                })?;
            }
            Ok(added)
        })
    }

    /// Remove a dependency edge. Returns `false` if it was not present.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn remove_dependency(&self, task_id: &str, depends_on: &str) -> Result<bool> {
        let now = now_rfc3339();

        self.store().with_transaction(|tx| {
            let removed = tx.delete_edge(task_id, depends_on)?;
            if removed {
                tx.record_history(&NewHistoryEntry {
                    task_id,
                    field_name: "dependencies",
                    old_value: Some(depends_on.to_string()),
                    new_value: None,
                    change_type: ChangeType::DependencyRemoved,
                    timestamp: &now,
                })?;
            }
            Ok(removed)
        })
    }

    /// Expand a task's transitive dependencies into a tree.
    ///
    /// A task reached through several edges appears once per edge; the graph
    /// invariant keeps the expansion finite.
    ///
    /// # Errors
    ///
    /// Fails with `TaskNotFound` if the root does not exist.
    pub fn dependency_tree(&self, id: &str) -> Result<DependencyNode> {
        struct Frame {
            task: Task,
            dep_ids: Vec<String>,
            next: usize,
            children: Vec<DependencyNode>,
        }

        let root = self
            .store()
            .get_task(id)?
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        let mut stack = vec![Frame {
            dep_ids: self.store().list_dependencies(&root.id)?,
            task: root,
            next: 0,
            children: Vec::new(),
        }];

        while let Some(mut frame) = stack.pop() {
            if frame.next == frame.dep_ids.len() {
                let node = DependencyNode::Task {
                    task: frame.task,
                    dependencies: frame.children,
                };
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                } else {
                    return Ok(node);
                }
                continue;
            }

            let dep_id = frame.dep_ids[frame.next].clone();
            frame.next += 1;
            match self.store().get_task(&dep_id)? {
                Some(task) => {
                    let dep_ids = self.store().list_dependencies(&task.id)?;
                    stack.push(frame);
                    stack.push(Frame { task, dep_ids, next: 0, children: Vec::new() });
                }
                None => {
                    frame.children.push(DependencyNode::Missing { id: dep_id });
                    stack.push(frame);
                }
            }
        }

        // The root frame always folds into a return above
        Err(Error::TaskNotFound(id.to_string()))
    }

    /// Tasks in `todo` whose every dependency is completed.
    ///
    /// An edge that does not resolve counts as unmet, so a task is never
    /// reported ready on the strength of a dangling dependency.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn ready_tasks(&self) -> Result<Vec<Task>> {
        let todos = self.store().list_tasks(&TaskFilter {
            status: Some(Status::Todo),
            ..Default::default()
        })?;

        let mut ready = Vec::new();
        for task in todos {
            let mut unmet = false;
            for dep_id in self.store().list_dependencies(&task.id)? {
                match self.store().get_task(&dep_id)? {
                    Some(dep) if dep.status == Status::Completed => {}
                    _ => {
                        unmet = true;
                        break;
                    }
                }
            }
            if !unmet {
                ready.push(task);
            }
        }
        Ok(ready)
    }
}
