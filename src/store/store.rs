use futures::FutureExt;
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, error, trace, warn};

use crate::action::ActionInfo;
use crate::draft::Draft;
use crate::error::{StoreError, StoreResult};
use crate::scheduler::{defer_after, Scheduler};

/// Continuations that elapse between opening an async draft and its commit.
const ASYNC_COMMIT_TURNS: usize = 2;

/// Callback invoked once per committed update.
///
/// Handlers are compared by pointer identity on unsubscribe, so keep the
/// `Arc` you registered around if you intend to remove it later.
pub type StateChangeHandler<T> = Arc<dyn Fn(&Arc<T>, &ActionInfo) + Send + Sync>;

/// Wrap a closure as a [`StateChangeHandler`].
pub fn handler<T, F>(f: F) -> StateChangeHandler<T>
where
    F: Fn(&Arc<T>, &ActionInfo) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Store settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name used in log records and as the inspector's connection name.
    pub name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "draftstore".to_string(),
        }
    }
}

/// The open draft and the thread that opened it.
struct OpenDraft<T> {
    draft: Draft<T>,
    owner: ThreadId,
}

struct Shared<T> {
    config: StoreConfig,
    state: RwLock<Arc<T>>,
    draft: Mutex<Option<OpenDraft<T>>>,
    released: Condvar,
    observers: RwLock<Vec<StateChangeHandler<T>>>,
    scheduler: Arc<dyn Scheduler>,
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    fn current(&self) -> Arc<T> {
        Arc::clone(&self.state.read())
    }

    /// Join the open draft, or open one. The flag tells whether this call owns it.
    ///
    /// Only the thread that opened a draft may join it. Other threads wait
    /// until the slot is free.
    fn enter_draft(&self) -> (Draft<T>, bool) {
        let me = thread::current().id();
        let mut slot = self.draft.lock();
        while let Some(open) = slot.as_ref() {
            if open.owner == me {
                return (open.draft.clone(), false);
            }
            trace!(store = %self.config.name, draft = open.draft.id(), "waiting for draft on another thread");
            self.released.wait(&mut slot);
        }
        let draft = Draft::open(self.current());
        debug!(store = %self.config.name, draft = draft.id(), "draft opened");
        *slot = Some(OpenDraft {
            draft: draft.clone(),
            owner: me,
        });
        (draft, true)
    }

    /// Freeze the open draft into the current state if `pick` accepts it.
    ///
    /// The state is written before the slot is cleared, so a writer waiting
    /// for the slot always starts from the committed state.
    fn commit_if(&self, pick: impl FnOnce(&Draft<T>) -> bool) -> Option<(Draft<T>, Arc<T>)> {
        let mut slot = self.draft.lock();
        let draft = slot.as_ref().map(|open| open.draft.clone())?;
        if !pick(&draft) {
            return None;
        }
        let next = draft.freeze();
        if let Some(next) = &next {
            *self.state.write() = Arc::clone(next);
        }
        *slot = None;
        drop(slot);
        self.released.notify_all();
        next.map(|next| (draft, next))
    }

    /// Clear the slot if `pick` accepts the open draft, and return that draft.
    fn take_if(&self, pick: impl FnOnce(&Draft<T>) -> bool) -> Option<Draft<T>> {
        let mut slot = self.draft.lock();
        if !slot.as_ref().is_some_and(|open| pick(&open.draft)) {
            return None;
        }
        let taken = slot.take().map(|open| open.draft);
        drop(slot);
        self.released.notify_all();
        taken
    }

    /// Commit `draft` if it is still the open draft, then notify observers.
    fn finish(&self, draft: &Draft<T>, action: &ActionInfo) -> bool {
        match self.commit_if(|open| open.same_as(draft)) {
            Some((draft, next)) => {
                self.publish(&draft, &next, action);
                true
            }
            None => {
                trace!(store = %self.config.name, draft = draft.id(), "draft superseded, skipping commit");
                false
            }
        }
    }

    fn publish(&self, draft: &Draft<T>, next: &Arc<T>, action: &ActionInfo) {
        debug!(
            store = %self.config.name,
            draft = draft.id(),
            feature = %action.feature_name,
            action = %action.name,
            is_async = action.is_async,
            "draft committed"
        );

        // Snapshot so handlers can subscribe or unsubscribe while we iterate.
        let observers = self.observers.read().clone();
        trace!(store = %self.config.name, observers = observers.len(), "notifying observers");
        for observer in &observers {
            observer(next, action);
        }
    }

    fn abandon(&self, draft: &Draft<T>) {
        if draft.discard() {
            debug!(store = %self.config.name, draft = draft.id(), "draft discarded");
        }
        self.take_if(|open| open.same_as(draft));
    }

    /// Commit whatever draft is open, tagged as asynchronous.
    fn settle(&self, action: ActionInfo) {
        if let Some((draft, next)) = self.commit_if(|_| true) {
            self.publish(&draft, &next, &action.into_async());
        }
    }

    /// Discard whatever draft is open.
    fn discard_open(&self) {
        if let Some(draft) = self.take_if(|_| true) {
            if draft.discard() {
                debug!(store = %self.config.name, draft = draft.id(), "open draft discarded after failed async update");
            }
        }
    }

    fn finish_scheduled(&self, draft: &Draft<T>, action: ActionInfo) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.finish(draft, &action)));
        if outcome.is_err() {
            error!(
                store = %self.config.name,
                draft = draft.id(),
                feature = %action.feature_name,
                action = %action.name,
                "async draft finalization panicked; observers after the failing one were skipped"
            );
        }
    }
}

/// An immutable-state container with copy-on-write drafts.
///
/// Readers always see a fully committed `Arc<T>`. Writers go through
/// [`Store::update`] (or one of its variants), which hands the mutator a
/// [`Draft`] and commits it into a new state when the outermost update
/// returns. Every commit notifies each subscribed handler exactly once.
///
/// Cloning a store clones the handle; all clones share state, draft slot and
/// observers.
///
/// # Examples
///
/// ```
/// use draftstore::{ActionInfo, Store, TurnQueue};
/// use std::sync::Arc;
///
/// #[derive(Clone)]
/// struct Counter {
///     count: i32,
/// }
///
/// let store = Store::new(Counter { count: 0 }, Arc::new(TurnQueue::new()));
/// store.update(
///     |draft| draft.modify(|s| s.count += 1),
///     ActionInfo::new("counter", "increment"),
/// );
/// assert_eq!(store.get_state().count, 1);
/// ```
pub struct Store<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + Sync + 'static> Store<T> {
    /// Create a store with the default config.
    pub fn new(initial: T, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_config(initial, scheduler, StoreConfig::default())
    }

    /// Create a store with an explicit config.
    pub fn with_config(initial: T, scheduler: Arc<dyn Scheduler>, config: StoreConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: RwLock::new(Arc::new(initial)),
                draft: Mutex::new(None),
                released: Condvar::new(),
                observers: RwLock::new(Vec::new()),
                scheduler,
            }),
        }
    }

    /// Settings this store was created with.
    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// The current committed state.
    pub fn get_state(&self) -> Arc<T> {
        self.shared.current()
    }

    /// Read the current state without cloning it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let state = self.shared.current();
        f(&state)
    }

    /// Register a handler. Registering the same handler twice notifies it twice.
    pub fn subscribe(&self, handler: StateChangeHandler<T>) {
        self.shared.observers.write().push(handler);
    }

    /// Remove every registration of `handler`. No-op if it is not registered.
    pub fn unsubscribe(&self, handler: &StateChangeHandler<T>) {
        let target = Arc::as_ptr(handler) as *const ();
        self.shared
            .observers
            .write()
            .retain(|registered| Arc::as_ptr(registered) as *const () != target);
    }

    /// Number of registered handlers, counting duplicates.
    pub fn observer_count(&self) -> usize {
        self.shared.observers.read().len()
    }

    /// The draft currently open, if any.
    pub fn current_draft(&self) -> Option<Draft<T>> {
        self.shared
            .draft
            .lock()
            .as_ref()
            .map(|open| open.draft.clone())
    }

    /// Whether any draft is open.
    pub fn has_open_draft(&self) -> bool {
        self.shared.draft.lock().is_some()
    }

    /// Apply an infallible mutator.
    ///
    /// If no draft is open, this call opens one and commits it when the
    /// mutator returns. If a draft is already open (a nested update, or an
    /// async leg in progress), the mutator writes into that draft and the
    /// owner of the draft decides when it is committed.
    ///
    /// A panicking mutator discards a draft this call opened and then resumes
    /// the panic.
    ///
    /// Nesting is per thread. A call made while another thread's draft is
    /// open blocks until that draft is committed or discarded, so a thread
    /// that drives the store's scheduler must not update while a foreign
    /// async draft is waiting on it.
    pub fn update<F, R>(&self, mutator: F, action: ActionInfo) -> R
    where
        F: FnOnce(&Draft<T>) -> R,
    {
        match self.try_update(|draft| Ok::<R, Infallible>(mutator(draft)), action) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Apply a fallible mutator.
    ///
    /// On `Err` the draft this call opened is discarded: the state is left
    /// unchanged and no handler runs. A nested call that fails leaves the
    /// draft alone and returns the error to its caller.
    pub fn try_update<F, R, E>(&self, mutator: F, action: ActionInfo) -> Result<R, E>
    where
        F: FnOnce(&Draft<T>) -> Result<R, E>,
    {
        let (draft, owner) = self.shared.enter_draft();
        if !owner {
            trace!(
                store = %self.shared.config.name,
                draft = draft.id(),
                action = %action.name,
                "joining open draft"
            );
            return mutator(&draft);
        }

        match panic::catch_unwind(AssertUnwindSafe(|| mutator(&draft))) {
            Ok(Ok(value)) => {
                self.shared.finish(&draft, &action);
                Ok(value)
            }
            Ok(Err(err)) => {
                self.shared.abandon(&draft);
                Err(err)
            }
            Err(payload) => {
                self.shared.abandon(&draft);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Apply a mutator whose work continues in a future.
    ///
    /// The synchronous part behaves exactly like [`Store::update`]. When the
    /// returned future completes with `Ok`, any draft still open (typically
    /// one the future opened with [`Store::start_async_draft`]) is committed
    /// with `is_async` set. When it completes with `Err`, the open draft is
    /// discarded without notification. The future's output is passed through
    /// unchanged.
    pub fn update_async<F, Fut, O, E>(
        &self,
        mutator: F,
        action: ActionInfo,
    ) -> impl Future<Output = Result<O, E>>
    where
        F: FnOnce(&Draft<T>) -> Fut,
        Fut: Future<Output = Result<O, E>>,
    {
        let pending = self.update(mutator, action.clone());
        let shared = Arc::downgrade(&self.shared);
        pending.map(move |outcome| {
            if let Some(shared) = shared.upgrade() {
                match &outcome {
                    Ok(_) => shared.settle(action),
                    Err(_) => shared.discard_open(),
                }
            }
            outcome
        })
    }

    /// Open a draft for the next leg of an async action.
    ///
    /// The draft is committed (with `is_async` set) after two deferred
    /// continuations on the store's scheduler, provided it is still the open
    /// draft by then. Apply every write for this leg before that window
    /// closes.
    ///
    /// Fails with [`StoreError::DraftAlreadyOpen`] while any draft is open.
    pub fn start_async_draft(&self, action: ActionInfo) -> StoreResult<Draft<T>> {
        let draft = {
            let mut slot = self.shared.draft.lock();
            if let Some(open) = slot.as_ref() {
                warn!(
                    store = %self.shared.config.name,
                    open = open.draft.id(),
                    action = %action.name,
                    "async draft rejected, another draft is open"
                );
                return Err(StoreError::DraftAlreadyOpen);
            }
            let draft = Draft::open(self.shared.current());
            *slot = Some(OpenDraft {
                draft: draft.clone(),
                owner: thread::current().id(),
            });
            draft
        };
        debug!(store = %self.shared.config.name, draft = draft.id(), action = %action.name, "async draft opened");

        let shared = Arc::downgrade(&self.shared);
        let scheduled = draft.clone();
        defer_after(
            Arc::clone(&self.shared.scheduler),
            ASYNC_COMMIT_TURNS,
            Box::new(move || {
                if let Some(shared) = shared.upgrade() {
                    shared.finish_scheduled(&scheduled, action.into_async());
                }
            }),
        );
        Ok(draft)
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}
