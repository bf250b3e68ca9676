use crate::types::TaskPatch;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Pending {
    generation: u64,
    patch: TaskPatch,
}

/// Per-id cancelable delayed writes. Scheduling against an id that already
/// has a pending write merges the patches and restarts the window; the older
/// timer is superseded (generation mismatch) rather than reused. At most one
/// write fires per id per quiet window.
pub struct Debouncer {
    delay: Duration,
    counter: AtomicU64,
    pending: Arc<Mutex<HashMap<i64, Pending>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            counter: AtomicU64::new(0),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn schedule<F>(&self, id: i64, patch: TaskPatch, fire: F)
    where
        F: FnOnce(TaskPatch) + Send + 'static,
    {
        let generation = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut pending = lock(&self.pending);
            let entry = pending.entry(id).or_insert_with(|| Pending {
                generation,
                patch: TaskPatch::default(),
            });
            entry.generation = generation;
            entry.patch.merge(patch);
        }
        let delay = self.delay;
        let pending = Arc::clone(&self.pending);
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            let ready = {
                let mut map = lock(&pending);
                match map.get(&id) {
                    Some(entry) if entry.generation == generation => {
                        map.remove(&id).map(|entry| entry.patch)
                    }
                    _ => None,
                }
            };
            if let Some(patch) = ready {
                fire(patch);
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

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(30);

    fn recorder() -> (Arc<Mutex<Vec<(i64, TaskPatch)>>>, impl Fn(&Debouncer, i64, TaskPatch)) {
        let fired: Arc<Mutex<Vec<(i64, TaskPatch)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let schedule = move |debouncer: &Debouncer, id: i64, patch: TaskPatch| {
            let sink = Arc::clone(&sink);
            debouncer.schedule(id, patch, move |patch| {
                sink.lock().unwrap().push((id, patch));
            });
        };
        (fired, schedule)
    }

    #[test]
    fn rapid_schedules_collapse_to_one_fire_with_final_state() {
        let debouncer = Debouncer::new(WINDOW);
        let (fired, schedule) = recorder();
        schedule(&debouncer, 1, TaskPatch::completed(true));
        schedule(&debouncer, 1, TaskPatch::completed(false));
        schedule(&debouncer, 1, TaskPatch::completed(true));
        std::thread::sleep(WINDOW * 4);
        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0], (1, TaskPatch::completed(true)));
    }

    #[test]
    fn patches_for_the_same_id_coalesce() {
        let debouncer = Debouncer::new(WINDOW);
        let (fired, schedule) = recorder();
        schedule(&debouncer, 7, TaskPatch::title("renamed"));
        schedule(&debouncer, 7, TaskPatch::completed(true));
        std::thread::sleep(WINDOW * 4);
        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        let patch = &fired[0].1;
        assert_eq!(patch.title.as_deref(), Some("renamed"));
        assert_eq!(patch.completed, Some(true));
    }

    #[test]
    fn different_ids_fire_independently() {
        let debouncer = Debouncer::new(WINDOW);
        let (fired, schedule) = recorder();
        schedule(&debouncer, 1, TaskPatch::completed(true));
        schedule(&debouncer, 2, TaskPatch::completed(true));
        std::thread::sleep(WINDOW * 4);
        assert_eq!(fired.lock().unwrap().len(), 2);
    }

    #[test]
    fn a_quiet_window_apart_fires_twice() {
        let debouncer = Debouncer::new(WINDOW);
        let (fired, schedule) = recorder();
        schedule(&debouncer, 1, TaskPatch::completed(true));
        std::thread::sleep(WINDOW * 4);
        schedule(&debouncer, 1, TaskPatch::completed(false));
        std::thread::sleep(WINDOW * 4);
        assert_eq!(fired.lock().unwrap().len(), 2);
    }
}
