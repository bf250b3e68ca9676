use crate::debounce::Debouncer;
use crate::error::{Result, TaskError};
use crate::http_client::TodoApi;
use crate::types::{Task, TaskPatch};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Rapid toggles/edits on one task within this window collapse into a single
/// outbound write.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// Pure view transform over the local list; never touches the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    All,
    Active,
    Completed,
}

#[derive(Default)]
struct ListState {
    /// Local cache, newest first. Authoritative only for optimistic edits
    /// awaiting confirmation; everything else mirrors the last server reply.
    tasks: Vec<Task>,
    /// Last server-confirmed copy per id; the rollback target for a failed
    /// optimistic write.
    confirmed: HashMap<i64, Task>,
    adding: bool,
    loading: HashSet<i64>,
    filter: Filter,
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

/// Client-side view of the task list: optimistic updates, per-id debounced
/// writes, per-id loading state, snapshot-semantics bulk clear.
pub struct ListController {
    api: Arc<dyn TodoApi>,
    state: Arc<Mutex<ListState>>,
    debouncer: Debouncer,
}

impl ListController {
    pub fn new(api: Arc<dyn TodoApi>) -> Self {
        Self::with_debounce_window(api, DEBOUNCE_WINDOW)
    }

    pub fn with_debounce_window(api: Arc<dyn TodoApi>, window: Duration) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(ListState::default())),
            debouncer: Debouncer::new(window),
        }
    }

    /// Replaces the cache and every confirmed copy from the server.
    pub fn refresh(&self) -> Result<()> {
        let tasks = self.api.list()?;
        let mut state = lock(&self.state);
        state.confirmed = tasks.iter().map(|t| (t.id, t.clone())).collect();
        state.tasks = tasks;
        Ok(())
    }

    pub fn tasks(&self) -> Vec<Task> {
        lock(&self.state).tasks.clone()
    }

    pub fn visible(&self) -> Vec<Task> {
        let state = lock(&self.state);
        state
            .tasks
            .iter()
            .filter(|t| match state.filter {
                Filter::All => true,
                Filter::Active => !t.completed,
                Filter::Completed => t.completed,
            })
            .cloned()
            .collect()
    }

    pub fn set_filter(&self, filter: Filter) {
        lock(&self.state).filter = filter;
    }

    /// True while a create request is in flight; the add control stays
    /// disabled for the duration.
    pub fn is_adding(&self) -> bool {
        lock(&self.state).adding
    }

    /// Ids currently awaiting a server response.
    pub fn loading_ids(&self) -> HashSet<i64> {
        lock(&self.state).loading.clone()
    }

    /// Pessimistic create: no optimistic row; the server-returned task is
    /// prepended on success.
    pub fn add(&self, title: &str) -> Result<Task> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(TaskError::Validation("title is required".to_string()));
        }
        lock(&self.state).adding = true;
        let result = self.api.create(trimmed);
        let mut state = lock(&self.state);
        state.adding = false;
        match result {
            Ok(task) => {
                state.confirmed.insert(task.id, task.clone());
                state.tasks.insert(0, task.clone());
                Ok(task)
            }
            Err(err) => {
                log::warn!("create failed: {err}");
                Err(err)
            }
        }
    }

    /// Optimistic flip; the write is debounced per id and carries the final
    /// requested state when it fires.
    pub fn toggle(&self, id: i64) {
        let desired = {
            let mut state = lock(&self.state);
            let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) else {
                return;
            };
            task.completed = !task.completed;
            task.completed
        };
        self.schedule_write(id, TaskPatch::completed(desired));
    }

    /// Same debounce key and discipline as [`toggle`]; an edit and a toggle
    /// inside one window coalesce into a single write.
    ///
    /// [`toggle`]: ListController::toggle
    pub fn edit(&self, id: i64, title: &str) {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return;
        }
        {
            let mut state = lock(&self.state);
            let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) else {
                return;
            };
            task.title = trimmed.to_string();
        }
        self.schedule_write(id, TaskPatch::title(trimmed));
    }

    /// Immediate delete, no debounce; the row leaves the cache only after the
    /// server confirms.
    pub fn remove(&self, id: i64) -> Result<()> {
        lock(&self.state).loading.insert(id);
        let result = self.api.delete(id);
        let mut state = lock(&self.state);
        state.loading.remove(&id);
        match result {
            Ok(()) => {
                state.tasks.retain(|t| t.id != id);
                state.confirmed.remove(&id);
                Ok(())
            }
            Err(err) => {
                log::warn!("delete {id} failed: {err}");
                Err(err)
            }
        }
    }

    /// Deletes the tasks that were completed at invocation time: the target
    /// set is snapshotted up front and never re-evaluated, so a task that
    /// becomes completed mid-batch is untouched. Deletions run concurrently
    /// and independently.
    pub fn clear_completed(&self) -> usize {
        let snapshot: Vec<i64> = {
            let mut state = lock(&self.state);
            let ids: Vec<i64> = state
                .tasks
                .iter()
                .filter(|t| t.completed)
                .map(|t| t.id)
                .collect();
            state.loading.extend(ids.iter().copied());
            ids
        };

        let handles: Vec<_> = snapshot
            .iter()
            .map(|&id| {
                let api = Arc::clone(&self.api);
                std::thread::spawn(move || (id, api.delete(id)))
            })
            .collect();

        let mut removed = Vec::new();
        for handle in handles {
            if let Ok((id, result)) = handle.join() {
                match result {
                    Ok(()) => removed.push(id),
                    Err(err) => log::warn!("clear-completed: delete {id} failed: {err}"),
                }
            }
        }

        let mut state = lock(&self.state);
        for id in &snapshot {
            state.loading.remove(id);
        }
        state.tasks.retain(|t| !removed.contains(&t.id));
        for id in &removed {
            state.confirmed.remove(id);
        }
        removed.len()
    }

    fn schedule_write(&self, id: i64, patch: TaskPatch) {
        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        self.debouncer.schedule(id, patch, move |patch| {
            lock(&state).loading.insert(id);
            let result = api.update(id, &patch);
            let mut guard = lock(&state);
            guard.loading.remove(&id);
            match result {
                Ok(task) => {
                    guard.confirmed.insert(id, task.clone());
                    if let Some(row) = guard.tasks.iter_mut().find(|t| t.id == id) {
                        *row = task;
                    }
                }
                Err(err) => {
                    // Explicit rollback: restore the last-confirmed copy
                    // instead of leaving stale optimistic state behind.
                    log::warn!("write to {id} failed, reverting: {err}");
                    if let Some(confirmed) = guard.confirmed.get(&id).cloned() {
                        if let Some(row) = guard.tasks.iter_mut().find(|t| t.id == id) {
                            *row = confirmed;
                        }
                    }
                }
            }
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
