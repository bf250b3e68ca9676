use crate::error::Result;
use crate::types::{Task, TaskPatch};
use crate::utils::now_millis;
use rusqlite::{params, Connection, Row};

/// Record-store contract. Implementations own id assignment and the creation
/// timestamp; field trimming and validation happen above, in the service.
pub trait TodoStore: Send {
    fn get(&self, id: i64) -> Result<Option<Task>>;
    /// All tasks, newest first. Equal timestamps tie-break on newest id.
    fn list(&self) -> Result<Vec<Task>>;
    fn insert(&mut self, title: &str) -> Result<Task>;
    /// Applies only the present fields; `None` when the id does not exist.
    fn update(&mut self, id: i64, patch: &TaskPatch) -> Result<Option<Task>>;
    /// Returns whether a record existed.
    fn delete(&mut self, id: i64) -> Result<bool>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(
            r#"
      CREATE TABLE IF NOT EXISTS todos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        completed INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
      );
      CREATE INDEX IF NOT EXISTS todos_created_idx ON todos(created_at);
      "#,
        )?;
        Ok(Self { conn })
    }

    fn from_row(row: &Row) -> rusqlite::Result<Task> {
        Ok(Task {
            id: row.get("id")?,
            title: row.get("title")?,
            completed: row.get("completed")?,
            created_at: row.get("created_at")?,
        })
    }
}

impl TodoStore for SqliteStore {
    fn get(&self, id: i64) -> Result<Option<Task>> {
        let mut stmt = self.conn.prepare("SELECT * FROM todos WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::from_row(row)?)),
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<Task>> {
        // id DESC so tasks created within the same millisecond still list
        // newest first.
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM todos ORDER BY created_at DESC, id DESC")?;
        let mut rows = stmt.query([])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(Self::from_row(row)?);
        }
        Ok(tasks)
    }

    fn insert(&mut self, title: &str) -> Result<Task> {
        let created_at = now_millis();
        self.conn.execute(
            "INSERT INTO todos (title, completed, created_at) VALUES (?1, 0, ?2)",
            params![title, created_at],
        )?;
        Ok(Task {
            id: self.conn.last_insert_rowid(),
            title: title.to_string(),
            completed: false,
            created_at,
        })
    }

    fn update(&mut self, id: i64, patch: &TaskPatch) -> Result<Option<Task>> {
        let Some(mut existing) = self.get(id)? else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            existing.title = title.clone();
        }
        if let Some(completed) = patch.completed {
            existing.completed = completed;
        }
        self.conn.execute(
            "UPDATE todos SET title = ?1, completed = ?2 WHERE id = ?3",
            params![existing.title, existing.completed, existing.id],
        )?;
        Ok(Some(existing))
    }

    fn delete(&mut self, id: i64) -> Result<bool> {
        let changes = self
            .conn
            .execute("DELETE FROM todos WHERE id = ?1", params![id])?;
        Ok(changes > 0)
    }
}

/// In-memory store: an explicit object owned by the composition root, not a
/// module-level array with a floating sequence counter.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: Vec<Task>,
    seq: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TodoStore for MemoryStore {
    fn get(&self, id: i64) -> Result<Option<Task>> {
        Ok(self.tasks.iter().find(|t| t.id == id).cloned())
    }

    fn list(&self) -> Result<Vec<Task>> {
        let mut tasks = self.tasks.clone();
        tasks.sort_by_key(|t| std::cmp::Reverse((t.created_at, t.id)));
        Ok(tasks)
    }

    fn insert(&mut self, title: &str) -> Result<Task> {
        self.seq += 1;
        let task = Task {
            id: self.seq,
            title: title.to_string(),
            completed: false,
            created_at: now_millis(),
        };
        self.tasks.push(task.clone());
        Ok(task)
    }

    fn update(&mut self, id: i64, patch: &TaskPatch) -> Result<Option<Task>> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        Ok(Some(task.clone()))
    }

    fn delete(&mut self, id: i64) -> Result<bool> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        Ok(self.tasks.len() < before)
    }
}
