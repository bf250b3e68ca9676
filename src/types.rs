use serde::{Deserialize, Serialize};

/// A single todo item. `created_at` is epoch milliseconds and is the sole
/// sort key for listing (newest first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub completed: bool,
    pub created_at: i64,
}

/// Partial update: only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            completed: None,
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            title: None,
            completed: Some(completed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.completed.is_none()
    }

    /// Later fields win; used when debounced writes coalesce.
    pub fn merge(&mut self, newer: TaskPatch) {
        if newer.title.is_some() {
            self.title = newer.title;
        }
        if newer.completed.is_some() {
            self.completed = newer.completed;
        }
    }
}
