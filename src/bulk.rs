//! Batch validation of status transitions.
//!
//! Checks a whole batch against the live task states without applying
//! anything. Per-item problems are findings in the report rather than
//! errors; only infrastructure failures abort the run.

use crate::engine::{check_transition, TaskEngine};
use crate::error::Result;
use crate::models::Status;
use crate::store::TaskStore;
use serde::{Deserialize, Serialize};

/// One requested transition in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionChange {
    /// The task to transition.
    pub task_id: String,
    /// The requested status.
    pub status: Status,
    /// Block reason, when the requested status is `blocked`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A batch of requested transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTransitionInput {
    /// The transitions to check, in order.
    pub changes: Vec<TransitionChange>,
}

/// The verdict on one requested transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionCheck {
    /// The task the request named.
    pub task_id: String,
    /// The task's current status, when it exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Status>,
    /// The requested status.
    pub to: Status,
    /// Whether the transition would be accepted right now.
    pub valid: bool,
    /// Why it would be rejected, when it would be.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The report over a whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTransitionReport {
    /// Number of requests checked.
    pub total: usize,
    /// How many would be accepted.
    pub valid: usize,
    /// How many would be rejected.
    pub invalid: usize,
    /// One verdict per request, in input order.
    pub results: Vec<TransitionCheck>,
}

fn check_one<S: TaskStore>(
    engine: &TaskEngine<S>,
    change: &TransitionChange,
) -> Result<TransitionCheck> {
    let Some(task) = engine.store().get_task(&change.task_id)? else {
        return Ok(TransitionCheck {
            task_id: change.task_id.clone(),
            from: None,
            to: change.status,
            valid: false,
            error: Some(format!("task not found: {}", change.task_id)),
        });
    };

    let verdict = check_transition(&task, change.status, change.reason.as_deref());
    Ok(TransitionCheck {
        task_id: change.task_id.clone(),
        from: Some(task.status),
        to: change.status,
        valid: verdict.is_ok(),
        error: verdict.err().map(|e| e.to_string()),
    })
}

/// Validate a batch of transitions against current task state.
///
/// Nothing is applied; each verdict reflects the state at the time of the
/// call. A task named twice is checked twice against the same state.
///
/// # Errors
///
/// Fails only on store errors; invalid requests land in the report.
pub fn validate_bulk_transitions<S: TaskStore>(
    engine: &TaskEngine<S>,
    changes: &[TransitionChange],
) -> Result<BulkTransitionReport> {
    let mut results = Vec::with_capacity(changes.len());
    for change in changes {
        results.push(check_one(engine, change)?);
    }

    let valid = results.iter().filter(|r| r.valid).count();
    Ok(BulkTransitionReport {
        total: results.len(),
        valid,
        invalid: results.len() - valid,
        results,
    })
}

/// Parse a [`BulkTransitionInput`] from JSON and validate it.
///
/// # Errors
///
/// Fails on malformed JSON or store errors.
pub fn validate_from_json<S: TaskStore>(
    engine: &TaskEngine<S>,
    json: &str,
) -> Result<BulkTransitionReport> {
    let input: BulkTransitionInput = serde_json::from_str(json)?;
    validate_bulk_transitions(engine, &input.changes)
}
