use crate::error::{Result, TaskError};
use crate::store::TodoStore;
use crate::types::{Task, TaskPatch};
use std::sync::{Arc, Mutex};

/// Validated operations over a [`TodoStore`]. Cloneable so the endpoint layer
/// can hand one copy to each connection thread; single-record writes go
/// through the shared mutex, which is all the coordination the store needs.
#[derive(Clone)]
pub struct TaskService {
    store: Arc<Mutex<Box<dyn TodoStore>>>,
}

impl TaskService {
    pub fn new(store: Box<dyn TodoStore>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub fn list_all(&self) -> Result<Vec<Task>> {
        self.lock().list()
    }

    pub fn get(&self, id: i64) -> Result<Task> {
        self.lock().get(id)?.ok_or(TaskError::NotFound(id))
    }

    pub fn create(&self, title: &str) -> Result<Task> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(TaskError::Validation("title is required".to_string()));
        }
        self.lock().insert(trimmed)
    }

    /// Applies whichever of the two fields are present. A present title is
    /// trimmed and re-validated the same way `create` validates it.
    pub fn replace(&self, id: i64, mut patch: TaskPatch) -> Result<Task> {
        if patch.is_empty() {
            return Err(TaskError::Validation("no fields to update".to_string()));
        }
        if let Some(title) = &patch.title {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err(TaskError::Validation("title cannot be empty".to_string()));
            }
            patch.title = Some(trimmed.to_string());
        }
        self.lock()
            .update(id, &patch)?
            .ok_or(TaskError::NotFound(id))
    }

    pub fn toggle_complete(&self, id: i64) -> Result<Task> {
        let mut store = self.lock();
        let current = store.get(id)?.ok_or(TaskError::NotFound(id))?;
        store
            .update(id, &TaskPatch::completed(!current.completed))?
            .ok_or(TaskError::NotFound(id))
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        if self.lock().delete(id)? {
            Ok(())
        } else {
            Err(TaskError::NotFound(id))
        }
    }

    /// Deletes every completed task. The deletions are independent: a failure
    /// on one id is logged and skipped, leaving a partially-cleared store
    /// rather than rolling back.
    pub fn clear_completed(&self) -> Result<usize> {
        let completed: Vec<i64> = self
            .list_all()?
            .into_iter()
            .filter(|t| t.completed)
            .map(|t| t.id)
            .collect();
        let mut removed = 0;
        for id in completed {
            match self.lock().delete(id) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => log::warn!("clear_completed: delete {id} failed: {err}"),
            }
        }
        Ok(removed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Box<dyn TodoStore>> {
        match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> TaskService {
        TaskService::new(Box::new(MemoryStore::new()))
    }

    #[test]
    fn create_round_trip_trims_the_title() {
        let svc = service();
        let created = svc.create("  Buy milk  ").unwrap();
        let fetched = svc.get(created.id).unwrap();
        assert_eq!(fetched.title, "Buy milk");
        assert!(!fetched.completed);
    }

    #[test]
    fn create_rejects_blank_titles() {
        let svc = service();
        assert!(matches!(svc.create(""), Err(TaskError::Validation(_))));
        assert!(matches!(svc.create("   "), Err(TaskError::Validation(_))));
    }

    #[test]
    fn creating_many_yields_distinct_ids() {
        let svc = service();
        let mut ids: Vec<i64> = (0..10)
            .map(|n| svc.create(&format!("task {n}")).unwrap().id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn list_all_returns_later_creations_first() {
        let svc = service();
        let first = svc.create("first").unwrap();
        let second = svc.create("second").unwrap();
        let listed = svc.list_all().unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn replace_requires_at_least_one_field() {
        let svc = service();
        let task = svc.create("unchanged").unwrap();
        let err = svc.replace(task.id, TaskPatch::default()).unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));
        assert_eq!(svc.get(task.id).unwrap().title, "unchanged");
    }

    #[test]
    fn replace_rejects_blank_title_like_create() {
        let svc = service();
        let task = svc.create("keep").unwrap();
        let err = svc.replace(task.id, TaskPatch::title("   ")).unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));
        assert_eq!(svc.get(task.id).unwrap().title, "keep");
    }

    #[test]
    fn replace_applies_partial_fields() {
        let svc = service();
        let task = svc.create("old title").unwrap();
        let updated = svc.replace(task.id, TaskPatch::title(" new title ")).unwrap();
        assert_eq!(updated.title, "new title");
        assert!(!updated.completed);
        let done = svc.replace(task.id, TaskPatch::completed(true)).unwrap();
        assert_eq!(done.title, "new title");
        assert!(done.completed);
    }

    #[test]
    fn toggle_twice_restores_original_state() {
        let svc = service();
        let task = svc.create("flip me").unwrap();
        assert!(svc.toggle_complete(task.id).unwrap().completed);
        assert!(!svc.toggle_complete(task.id).unwrap().completed);
    }

    #[test]
    fn operations_on_absent_ids_report_not_found() {
        let svc = service();
        let task = svc.create("survivor").unwrap();
        assert!(matches!(svc.get(999_999), Err(TaskError::NotFound(_))));
        assert!(matches!(
            svc.replace(999_999, TaskPatch::completed(true)),
            Err(TaskError::NotFound(_))
        ));
        assert!(matches!(svc.toggle_complete(999_999), Err(TaskError::NotFound(_))));
        assert!(matches!(svc.delete(999_999), Err(TaskError::NotFound(_))));
        // The store is untouched.
        assert_eq!(svc.list_all().unwrap().len(), 1);
        assert_eq!(svc.get(task.id).unwrap().title, "survivor");
    }

    #[test]
    fn clear_completed_removes_only_completed_tasks() {
        let svc = service();
        let a = svc.create("done a").unwrap();
        let b = svc.create("done b").unwrap();
        let c = svc.create("active").unwrap();
        svc.replace(a.id, TaskPatch::completed(true)).unwrap();
        svc.replace(b.id, TaskPatch::completed(true)).unwrap();
        assert_eq!(svc.clear_completed().unwrap(), 2);
        let remaining = svc.list_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, c.id);
    }
}
