//! Task store trait, unit-of-work trait, and the `SQLite` implementation.
//!
//! The engine never talks SQL: it reads through [`TaskStore`] and mutates
//! through a [`TaskTx`] handed out by [`TaskStore::with_transaction`], which
//! commits only if the whole closure succeeds. [`SqliteTaskStore`] is the
//! reference substrate.

use crate::error::{Error, Result};
use crate::models::{ChangeType, HistoryEntry, Priority, Status, Task};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Columns of the `tasks` table in the order every task query selects them.
const TASK_COLUMNS: &str =
    "id, title, description, priority, status, parent_id, blocked_reason, completed_at, \
     created_at, updated_at";

/// Read-side storage operations.
///
/// All methods return a `Result` and may fail with database errors.
#[allow(clippy::missing_errors_doc)]
pub trait TaskStore {
    /// Get a task by ID.
    fn get_task(&self, id: &str) -> Result<Option<Task>>;

    /// List tasks matching the filter, most important first.
    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    /// List the direct children of a task, oldest first.
    fn list_children(&self, parent_id: &str) -> Result<Vec<Task>>;

    /// IDs of the tasks the given task depends on.
    fn list_dependencies(&self, task_id: &str) -> Result<Vec<String>>;

    /// IDs of the tasks that depend on the given task.
    fn list_dependents(&self, task_id: &str) -> Result<Vec<String>>;

    /// History entries for a task in insertion order, optionally capped.
    fn history_for(&self, task_id: &str, limit: Option<usize>) -> Result<Vec<HistoryEntry>>;

    /// Run `work` inside one unit of work.
    ///
    /// The mutations made through the [`TaskTx`] are committed only if the
    /// closure returns `Ok`; any error rolls every one of them back.
    fn with_transaction<T>(&self, work: impl FnOnce(&mut dyn TaskTx) -> Result<T>) -> Result<T>;
}

/// Mutating view of the store, valid for one transaction.
#[allow(clippy::missing_errors_doc)]
pub trait TaskTx {
    /// Get a task by ID.
    fn get_task(&mut self, id: &str) -> Result<Option<Task>>;

    /// Insert a freshly built task record.
    fn insert_task(&mut self, task: &Task) -> Result<()>;

    /// Apply a field patch to a task.
    fn apply_patch(&mut self, id: &str, patch: &TaskPatch) -> Result<()>;

    /// Delete a task together with its edges (both directions) and history.
    fn delete_task(&mut self, id: &str) -> Result<()>;

    /// List the direct children of a task, oldest first.
    fn list_children(&mut self, parent_id: &str) -> Result<Vec<Task>>;

    /// IDs of the tasks the given task depends on.
    fn list_dependencies(&mut self, task_id: &str) -> Result<Vec<String>>;

    /// IDs of the tasks that depend on the given task.
    fn list_dependents(&mut self, task_id: &str) -> Result<Vec<String>>;

    /// Insert a dependency edge. Returns `false` if it already existed.
    fn insert_edge(&mut self, task_id: &str, depends_on: &str) -> Result<bool>;

    /// Delete a dependency edge. Returns `false` if it was not present.
    fn delete_edge(&mut self, task_id: &str, depends_on: &str) -> Result<bool>;

    /// Append one history entry.
    fn record_history(&mut self, entry: &NewHistoryEntry<'_>) -> Result<()>;
}

/// Fields a transaction can change on a task.
///
/// Outer `None` leaves the field alone; for the nullable columns the inner
/// `Option` is the stored value, so `Some(None)` clears the field.
#[derive(Debug, Default, Clone)]
pub struct TaskPatch {
    /// New title (if Some).
    pub title: Option<String>,
    /// New description (if Some).
    pub description: Option<String>,
    /// New priority (if Some).
    pub priority: Option<Priority>,
    /// New status (if Some).
    pub status: Option<Status>,
    /// New blocked reason (if Some).
    pub blocked_reason: Option<Option<String>>,
    /// New completion timestamp (if Some).
    pub completed_at: Option<Option<String>>,
    /// New parent (if Some).
    pub parent: Option<Option<String>>,
    /// New updated-at timestamp (if Some).
    pub updated_at: Option<String>,
}

impl TaskPatch {
    /// Check if any fields are set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.blocked_reason.is_none()
            && self.completed_at.is_none()
            && self.parent.is_none()
            && self.updated_at.is_none()
    }
}

/// A history entry about to be recorded.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry<'a> {
    /// ID of the task the entry belongs to.
    pub task_id: &'a str,
    /// Name of the field that changed.
    pub field_name: &'a str,
    /// Value before the change.
    pub old_value: Option<String>,
    /// Value after the change.
    pub new_value: Option<String>,
    /// What kind of mutation caused the change.
    pub change_type: ChangeType,
    /// RFC 3339 timestamp of the change.
    pub timestamp: &'a str,
}

/// Filter options for listing tasks.
#[derive(Debug, Default, Clone)]
pub struct TaskFilter {
    /// Filter by status.
    pub status: Option<Status>,
    /// Filter by exact priority.
    pub priority: Option<Priority>,
    /// Filter by maximum priority (inclusive, lower number = higher priority).
    pub max_priority: Option<Priority>,
}

/// SQLite-backed task store.
#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    db_path: PathBuf,
}

impl SqliteTaskStore {
    /// Create a store at the given database path, initializing the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let store = Self { db_path: db_path.as_ref().to_path_buf() };
        store.init_schema()?;
        Ok(store)
    }

    /// Get the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a connection to the database.
    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
        Ok(conn)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            r"
            -- Core tasks table
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                priority INTEGER NOT NULL DEFAULT 2 CHECK (priority >= 0 AND priority <= 4),
                status TEXT NOT NULL DEFAULT 'todo'
                    CHECK (status IN ('todo', 'active', 'paused', 'blocked', 'completed', 'archived')),
                parent_id TEXT REFERENCES tasks(id),
                blocked_reason TEXT,
                completed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Dependencies (task depends_on another task)
            CREATE TABLE IF NOT EXISTS task_dependencies (
                task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                depends_on TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                PRIMARY KEY (task_id, depends_on),
                CHECK (task_id != depends_on)
            );

            -- Immutable per-task change history
            CREATE TABLE IF NOT EXISTS task_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                field_name TEXT NOT NULL,
                old_value TEXT,
                new_value TEXT,
                change_type TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            -- Indexes for common queries
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);
            CREATE INDEX IF NOT EXISTS idx_task_dependencies_depends_on ON task_dependencies(depends_on);
            CREATE INDEX IF NOT EXISTS idx_task_history_task_id ON task_history(task_id);
            ",
        )?;

        Ok(())
    }

    /// Parse a task from a row.
    fn parse_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let priority_val: u8 = row.get(3)?;
        let status_str: String = row.get(4)?;

        Ok(Task {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            priority: Priority::from_u8(priority_val).unwrap_or_default(),
            status: Status::from_str(&status_str).unwrap_or_default(),
            parent: row.get(5)?,
            blocked_reason: row.get(6)?,
            completed_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    /// Parse a history entry from a row.
    fn parse_history(row: &rusqlite::Row) -> rusqlite::Result<HistoryEntry> {
        let change_type_str: String = row.get(5)?;
        Ok(HistoryEntry {
            id: row.get(0)?,
            task_id: row.get(1)?,
            field_name: row.get(2)?,
            old_value: row.get(3)?,
            new_value: row.get(4)?,
            change_type: ChangeType::from_str(&change_type_str).unwrap_or(ChangeType::Update),
            timestamp: row.get(6)?,
        })
    }
}

fn query_task(conn: &Connection, id: &str) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            SqliteTaskStore::parse_task,
        )
        .optional()?;
    Ok(task)
}

fn query_children(conn: &Connection, parent_id: &str) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE parent_id = ?1 ORDER BY created_at ASC, id ASC"
    ))?;
    let children =
        stmt.query_map(params![parent_id], SqliteTaskStore::parse_task)?.flatten().collect();
    Ok(children)
}

fn query_dependencies(conn: &Connection, task_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT depends_on FROM task_dependencies WHERE task_id = ?1 ORDER BY depends_on",
    )?;
    let deps = stmt.query_map(params![task_id], |row| row.get(0))?.flatten().collect();
    Ok(deps)
}

fn query_dependents(conn: &Connection, task_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT task_id FROM task_dependencies WHERE depends_on = ?1 ORDER BY task_id")?;
    let deps = stmt.query_map(params![task_id], |row| row.get(0))?.flatten().collect();
    Ok(deps)
}

impl TaskStore for SqliteTaskStore {
    fn get_task(&self, id: &str) -> Result<Option<Task>> {
        query_task(&self.open()?, id)
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let conn = self.open()?;

        let mut conditions = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            values.push(Box::new(status.as_str().to_string()));
        }
        if let Some(priority) = filter.priority {
            conditions.push("priority = ?");
            values.push(Box::new(priority.as_u8()));
        }
        if let Some(max_priority) = filter.max_priority {
            conditions.push("priority <= ?");
            values.push(Box::new(max_priority.as_u8()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks {where_clause}
             ORDER BY priority ASC, created_at ASC, id ASC"
        );

        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(AsRef::as_ref).collect();
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt.query_map(params.as_slice(), Self::parse_task)?.flatten().collect();
        Ok(tasks)
    }

    fn list_children(&self, parent_id: &str) -> Result<Vec<Task>> {
        query_children(&self.open()?, parent_id)
    }

    fn list_dependencies(&self, task_id: &str) -> Result<Vec<String>> {
        query_dependencies(&self.open()?, task_id)
    }

    fn list_dependents(&self, task_id: &str) -> Result<Vec<String>> {
        query_dependents(&self.open()?, task_id)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn history_for(&self, task_id: &str, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let conn = self.open()?;

        let base = "SELECT id, task_id, field_name, old_value, new_value, change_type, timestamp
             FROM task_history WHERE task_id = ?1 ORDER BY id ASC";

        let entries = match limit {
            Some(limit) => {
                let mut stmt = conn.prepare(&format!("{base} LIMIT ?2"))?;
                let rows = stmt
                    .query_map(params![task_id, limit as i64], Self::parse_history)?
                    .flatten()
                    .collect();
                rows
            }
            None => {
                let mut stmt = conn.prepare(base)?;
                let rows =
                    stmt.query_map(params![task_id], Self::parse_history)?.flatten().collect();
                rows
            }
        };
        Ok(entries)
    }

    fn with_transaction<T>(&self, work: impl FnOnce(&mut dyn TaskTx) -> Result<T>) -> Result<T> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let mut scope = SqliteTx { tx };
        // Dropping an uncommitted rusqlite transaction rolls it back
        let value = work(&mut scope)?;
        scope.tx.commit()?;
        Ok(value)
    }
}

/// One open transaction against a [`SqliteTaskStore`].
struct SqliteTx<'c> {
    tx: rusqlite::Transaction<'c>,
}

impl TaskTx for SqliteTx<'_> {
    fn get_task(&mut self, id: &str) -> Result<Option<Task>> {
        query_task(&self.tx, id)
    }

    fn insert_task(&mut self, task: &Task) -> Result<()> {
        self.tx.execute(
            "INSERT INTO tasks (id, title, description, priority, status, parent_id,
                                blocked_reason, completed_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id,
                task.title,
                task.description,
                task.priority.as_u8(),
                task.status.as_str(),
                task.parent,
                task.blocked_reason,
                task.completed_at,
                task.created_at,
                task.updated_at,
            ],
        )?;
        Ok(())
    }

    fn apply_patch(&mut self, id: &str, patch: &TaskPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut sets = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref title) = patch.title {
            sets.push("title = ?");
            values.push(Box::new(title.clone()));
        }
        if let Some(ref description) = patch.description {
            sets.push("description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(priority) = patch.priority {
            sets.push("priority = ?");
            values.push(Box::new(priority.as_u8()));
        }
        if let Some(status) = patch.status {
            sets.push("status = ?");
            values.push(Box::new(status.as_str().to_string()));
        }
        if let Some(ref reason) = patch.blocked_reason {
            sets.push("blocked_reason = ?");
            values.push(Box::new(reason.clone()));
        }
        if let Some(ref completed_at) = patch.completed_at {
            sets.push("completed_at = ?");
            values.push(Box::new(completed_at.clone()));
        }
        if let Some(ref parent) = patch.parent {
            sets.push("parent_id = ?");
            values.push(Box::new(parent.clone()));
        }
        if let Some(ref updated_at) = patch.updated_at {
            sets.push("updated_at = ?");
            values.push(Box::new(updated_at.clone()));
        }

        values.push(Box::new(id.to_string()));

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(AsRef::as_ref).collect();
        let updated = self.tx.execute(&sql, params.as_slice())?;
        if updated == 0 {
            return Err(Error::TaskNotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_task(&mut self, id: &str) -> Result<()> {
        // Edges and history go with the task via ON DELETE CASCADE
        let deleted = self.tx.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(Error::TaskNotFound(id.to_string()));
        }
        Ok(())
    }

    fn list_children(&mut self, parent_id: &str) -> Result<Vec<Task>> {
        query_children(&self.tx, parent_id)
    }

    fn list_dependencies(&mut self, task_id: &str) -> Result<Vec<String>> {
        query_dependencies(&self.tx, task_id)
    }

    fn list_dependents(&mut self, task_id: &str) -> Result<Vec<String>> {
        query_dependents(&self.tx, task_id)
    }

    fn insert_edge(&mut self, task_id: &str, depends_on: &str) -> Result<bool> {
        let inserted = self.tx.execute(
            "INSERT OR IGNORE INTO task_dependencies (task_id, depends_on) VALUES (?1, ?2)",
            params![task_id, depends_on],
        )?;
        Ok(inserted > 0)
    }

    fn delete_edge(&mut self, task_id: &str, depends_on: &str) -> Result<bool> {
        let deleted = self.tx.execute(
            "DELETE FROM task_dependencies WHERE task_id = ?1 AND depends_on = ?2",
            params![task_id, depends_on],
        )?;
        Ok(deleted > 0)
    }

    fn record_history(&mut self, entry: &NewHistoryEntry<'_>) -> Result<()> {
        self.tx.execute(
            "INSERT INTO task_history (task_id, field_name, old_value, new_value, change_type, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.task_id,
                entry.field_name,
                entry.old_value,
                entry.new_value,
                entry.change_type.as_str(),
                entry.timestamp,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, SqliteTaskStore) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("test.db");
        let store = SqliteTaskStore::new(&db_path).unwrap();
        (dir, store)
    }

    fn sample_task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            description: String::new(),
            priority: Priority::Medium,
            status: Status::Todo,
            parent: None,
            blocked_reason: None,
            completed_at: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn insert(store: &SqliteTaskStore, task: &Task) {
        store.with_transaction(|tx| tx.insert_task(task)).unwrap();
    }

    #[test]
    fn test_insert_and_get_task() {
        let (_dir, store) = create_test_store();
        insert(&store, &sample_task("a-0001"));

        let fetched = store.get_task("a-0001").unwrap().unwrap();
        assert_eq!(fetched.title, "Task a-0001");
        assert_eq!(fetched.status, Status::Todo);
        assert!(store.get_task("missing").unwrap().is_none());
    }

    #[test]
    fn test_apply_patch_sets_and_clears_fields() {
        let (_dir, store) = create_test_store();
        insert(&store, &sample_task("a-0001"));

        store
            .with_transaction(|tx| {
                tx.apply_patch(
                    "a-0001",
                    &TaskPatch {
                        status: Some(Status::Blocked),
                        blocked_reason: Some(Some("waiting".to_string())),
                        updated_at: Some("2024-01-02T00:00:00Z".to_string()),
                        ..Default::default()
                    },
                )
            })
            .unwrap();

        let task = store.get_task("a-0001").unwrap().unwrap();
        assert_eq!(task.status, Status::Blocked);
        assert_eq!(task.blocked_reason.as_deref(), Some("waiting"));
        assert_eq!(task.updated_at, "2024-01-02T00:00:00Z");

        store
            .with_transaction(|tx| {
                tx.apply_patch(
                    "a-0001",
                    &TaskPatch {
                        status: Some(Status::Active),
                        blocked_reason: Some(None),
                        ..Default::default()
                    },
                )
            })
            .unwrap();

        let task = store.get_task("a-0001").unwrap().unwrap();
        assert_eq!(task.status, Status::Active);
        assert!(task.blocked_reason.is_none());
    }

    #[test]
    fn test_apply_patch_unknown_task() {
        let (_dir, store) = create_test_store();
        let result = store.with_transaction(|tx| {
            tx.apply_patch(
                "missing",
                &TaskPatch { status: Some(Status::Active), ..Default::default() },
            )
        });
        assert!(matches!(result, Err(Error::TaskNotFound(_))));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let (_dir, store) = create_test_store();
        insert(&store, &sample_task("a-0001"));

        let result: Result<()> = store.with_transaction(|tx| {
            tx.apply_patch(
                "a-0001",
                &TaskPatch { status: Some(Status::Active), ..Default::default() },
            )?;
            Err(Error::NoActiveTask)
        });
        assert!(result.is_err());

        // The patch inside the failed transaction must not be visible
        let task = store.get_task("a-0001").unwrap().unwrap();
        assert_eq!(task.status, Status::Todo);
    }

    #[test]
    fn test_edges_are_idempotent() {
        let (_dir, store) = create_test_store();
        insert(&store, &sample_task("a-0001"));
        insert(&store, &sample_task("b-0002"));

        let first = store.with_transaction(|tx| tx.insert_edge("a-0001", "b-0002")).unwrap();
        let second = store.with_transaction(|tx| tx.insert_edge("a-0001", "b-0002")).unwrap();
        assert!(first);
        assert!(!second);

        assert_eq!(store.list_dependencies("a-0001").unwrap(), vec!["b-0002"]);
        assert_eq!(store.list_dependents("b-0002").unwrap(), vec!["a-0001"]);

        assert!(store.with_transaction(|tx| tx.delete_edge("a-0001", "b-0002")).unwrap());
        assert!(!store.with_transaction(|tx| tx.delete_edge("a-0001", "b-0002")).unwrap());
    }

    #[test]
    fn test_delete_task_removes_edges_and_history() {
        let (_dir, store) = create_test_store();
        insert(&store, &sample_task("a-0001"));
        insert(&store, &sample_task("b-0002"));

        store
            .with_transaction(|tx| {
                tx.insert_edge("a-0001", "b-0002")?;
                tx.record_history(&NewHistoryEntry {
                    task_id: "b-0002",
                    field_name: "status",
                    old_value: None,
                    new_value: Some("todo".to_string()),
                    change_type: ChangeType::Create,
                    timestamp: "2024-01-01T00:00:00Z",
                })
            })
            .unwrap();

        store.with_transaction(|tx| tx.delete_task("b-0002")).unwrap();

        assert!(store.get_task("b-0002").unwrap().is_none());
        assert!(store.list_dependencies("a-0001").unwrap().is_empty());
        assert!(store.history_for("b-0002", None).unwrap().is_empty());
    }

    #[test]
    fn test_list_children_ordering() {
        let (_dir, store) = create_test_store();
        insert(&store, &sample_task("p-0001"));

        let mut first = sample_task("c-0001");
        first.parent = Some("p-0001".to_string());
        let mut second = sample_task("c-0002");
        second.parent = Some("p-0001".to_string());
        second.created_at = "2024-01-02T00:00:00Z".to_string();
        insert(&store, &first);
        insert(&store, &second);

        let children = store.list_children("p-0001").unwrap();
        assert_eq!(
            children.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["c-0001", "c-0002"]
        );
    }

    #[test]
    fn test_list_tasks_filters_and_orders() {
        let (_dir, store) = create_test_store();

        let mut low = sample_task("low-0001");
        low.priority = Priority::Low;
        let mut high = sample_task("high-0002");
        high.priority = Priority::High;
        let mut done = sample_task("done-0003");
        done.status = Status::Completed;
        insert(&store, &low);
        insert(&store, &high);
        insert(&store, &done);

        let all = store.list_tasks(&TaskFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, "high-0002");

        let todos = store
            .list_tasks(&TaskFilter { status: Some(Status::Todo), ..Default::default() })
            .unwrap();
        assert_eq!(todos.len(), 2);

        let urgent = store
            .list_tasks(&TaskFilter { max_priority: Some(Priority::High), ..Default::default() })
            .unwrap();
        assert_eq!(urgent.len(), 1);
        assert_eq!(urgent[0].id, "high-0002");
    }

    #[test]
    fn test_history_round_trip_and_limit() {
        let (_dir, store) = create_test_store();
        insert(&store, &sample_task("a-0001"));

        store
            .with_transaction(|tx| {
                for (field, old, new) in [
                    ("status", None, Some("todo")),
                    ("status", Some("todo"), Some("active")),
                    ("priority", Some("2"), Some("1")),
                ] {
                    tx.record_history(&NewHistoryEntry {
                        task_id: "a-0001",
                        field_name: field,
                        old_value: old.map(str::to_string),
                        new_value: new.map(str::to_string),
                        change_type: ChangeType::Update,
                        timestamp: "2024-01-01T00:00:00Z",
                    })?;
                }
                Ok(())
            })
            .unwrap();

        let entries = store.history_for("a-0001", None).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].old_value.as_deref(), Some("todo"));
        assert_eq!(entries[1].new_value.as_deref(), Some("active"));

        let capped = store.history_for("a-0001", Some(2)).unwrap();
        assert_eq!(capped.len(), 2);
    }
}
