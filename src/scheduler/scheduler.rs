use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs continuations after the current synchronous segment has finished.
///
/// Implementations must never run a task inline from `defer`; the caller is
/// usually still holding on to work it expects to finish before the task
/// runs.
pub trait Scheduler: Send + Sync {
    /// Queue `task` to run on a later turn.
    fn defer(&self, task: Task);
}

/// Queue `task` so that it runs `turns` turns from now.
///
/// Each turn re-defers the remaining work once, so with `turns == 2` the task
/// runs after two consecutive continuations.
pub fn defer_after(scheduler: Arc<dyn Scheduler>, turns: usize, task: Task) {
    if turns <= 1 {
        scheduler.defer(task);
        return;
    }
    let next = Arc::clone(&scheduler);
    scheduler.defer(Box::new(move || defer_after(next, turns - 1, task)));
}

/// A manually driven turn queue.
///
/// Each call to [`TurnQueue::run_turn`] runs exactly the tasks that were
/// queued before the call started. Tasks deferred while a turn is running
/// wait for the next turn.
///
/// # Examples
///
/// ```
/// use draftstore::{Scheduler, TurnQueue};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let queue = Arc::new(TurnQueue::new());
/// let hits = Arc::new(AtomicUsize::new(0));
///
/// let hits_clone = hits.clone();
/// queue.defer(Box::new(move || {
///     hits_clone.fetch_add(1, Ordering::SeqCst);
/// }));
///
/// assert_eq!(hits.load(Ordering::SeqCst), 0);
/// assert_eq!(queue.run_turn(), 1);
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
#[derive(Default)]
pub struct TurnQueue {
    queue: Mutex<VecDeque<Task>>,
}

impl TurnQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting for the next turn.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run one turn. Returns how many tasks ran.
    ///
    /// If a task panics, the tasks after it in this turn are put back at the
    /// front of the queue before the panic resumes, so the next turn still
    /// runs them.
    pub fn run_turn(&self) -> usize {
        // Lock released before running so tasks can defer more work.
        let mut batch = std::mem::take(&mut *self.queue.lock());
        let ran = batch.len();
        while let Some(task) = batch.pop_front() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                let mut queue = self.queue.lock();
                while let Some(rest) = batch.pop_back() {
                    queue.push_front(rest);
                }
                drop(queue);
                panic::resume_unwind(payload);
            }
        }
        ran
    }

    /// Run turns until nothing is queued. Returns the number of turns run.
    pub fn run_until_idle(&self) -> usize {
        let mut turns = 0;
        while self.run_turn() > 0 {
            turns += 1;
        }
        turns
    }
}

impl Scheduler for TurnQueue {
    fn defer(&self, task: Task) {
        self.queue.lock().push_back(task);
    }
}
