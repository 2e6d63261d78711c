use parking_lot::Mutex;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};

static NEXT_DRAFT_ID: AtomicU64 = AtomicU64::new(1);

// Drafts whose value lock is held by a closure running on this thread
thread_local! {
    static ACCESSING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Marks a draft as accessed on this thread until dropped.
struct Access(u64);

impl Access {
    fn enter(id: u64) -> StoreResult<Self> {
        ACCESSING.with(|active| {
            let mut active = active.borrow_mut();
            if active.contains(&id) {
                return Err(StoreError::DraftBusy);
            }
            active.push(id);
            Ok(Access(id))
        })
    }
}

impl Drop for Access {
    fn drop(&mut self) {
        ACCESSING.with(|active| active.borrow_mut().retain(|id| *id != self.0));
    }
}

/// Lifecycle marker of a draft.
///
/// Holders of a draft handle can check this to learn whether the store
/// committed their changes or threw them away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DraftStatus {
    /// The draft accepts writes and has not been finalized.
    Open,
    /// The draft was frozen into a new state.
    Committed,
    /// The draft was dropped without producing a state.
    Discarded,
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DraftStatus::Open => "open",
            DraftStatus::Committed => "committed",
            DraftStatus::Discarded => "discarded",
        };
        f.write_str(label)
    }
}

enum Slot<T> {
    Open(Arc<T>),
    Committed,
    Discarded,
}

impl<T> Slot<T> {
    fn status(&self) -> DraftStatus {
        match self {
            Slot::Open(_) => DraftStatus::Open,
            Slot::Committed => DraftStatus::Committed,
            Slot::Discarded => DraftStatus::Discarded,
        }
    }
}

struct DraftInner<T> {
    id: u64,
    base: Arc<T>,
    slot: Mutex<Slot<T>>,
}

/// A mutable working view over a state snapshot.
///
/// Cloning a `Draft` clones the handle, not the contents: every clone points
/// at the same working value and observes the same status. Writes go through
/// [`Draft::modify`], which copies the root on first write and leaves every
/// `Arc`-held child shared until that child is itself made mutable.
///
/// # Examples
///
/// ```
/// use draftstore::{ActionInfo, Store, TurnQueue};
/// use std::sync::Arc;
///
/// let store = Store::new(vec![1, 2, 3], Arc::new(TurnQueue::new()));
/// store.update(
///     |draft| draft.modify(|items| items.push(4)),
///     ActionInfo::new("items", "push"),
/// );
/// assert_eq!(*store.get_state(), vec![1, 2, 3, 4]);
/// ```
pub struct Draft<T> {
    inner: Arc<DraftInner<T>>,
}

impl<T: Clone> Draft<T> {
    pub(crate) fn open(base: Arc<T>) -> Self {
        let working = Arc::clone(&base);
        Self {
            inner: Arc::new(DraftInner {
                id: NEXT_DRAFT_ID.fetch_add(1, Ordering::Relaxed),
                base,
                slot: Mutex::new(Slot::Open(working)),
            }),
        }
    }

    /// Process-unique identifier, useful in logs.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Run `f` against the slot with the value lock held.
    ///
    /// Re-entering from inside `f` on the same thread fails with
    /// [`StoreError::DraftBusy`] instead of deadlocking.
    fn access<R>(&self, f: impl FnOnce(&mut Slot<T>) -> R) -> StoreResult<R> {
        let _access = Access::enter(self.inner.id)?;
        let mut slot = self.inner.slot.lock();
        Ok(f(&mut slot))
    }

    /// Current lifecycle status.
    pub fn status(&self) -> DraftStatus {
        // Only an open draft can be busy.
        self.access(|slot| slot.status())
            .unwrap_or(DraftStatus::Open)
    }

    /// Whether the draft still accepts writes.
    pub fn is_open(&self) -> bool {
        self.status() == DraftStatus::Open
    }

    /// The state this draft was opened from.
    pub fn base(&self) -> &Arc<T> {
        &self.inner.base
    }

    /// Whether any write has materialized a copy of the root yet.
    ///
    /// Always `true` from inside a [`Draft::modify`] closure.
    pub fn is_modified(&self) -> bool {
        let base = &self.inner.base;
        self.access(|slot| match slot {
            Slot::Open(working) => !Arc::ptr_eq(working, base),
            _ => false,
        })
        .unwrap_or(true)
    }

    /// Read the working value.
    pub fn try_read<R>(&self, f: impl FnOnce(&T) -> R) -> StoreResult<R> {
        self.access(|slot| match slot {
            Slot::Open(working) => Ok(f(working)),
            closed => Err(StoreError::DraftClosed(closed.status())),
        })?
    }

    /// Read the working value.
    ///
    /// # Panics
    ///
    /// Panics if the draft is no longer open, or if called from inside one of
    /// this draft's own closures. Use [`Draft::try_read`] when the draft may
    /// have been finalized concurrently.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        match self.try_read(f) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Apply a write to the working value.
    ///
    /// The draft's value lock is held while `f` runs. Touching the same draft
    /// again from inside `f` (directly, or through a nested update on the
    /// store) fails with [`StoreError::DraftBusy`].
    pub fn try_modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> StoreResult<R> {
        self.access(|slot| match slot {
            Slot::Open(working) => Ok(f(Arc::make_mut(working))),
            closed => Err(StoreError::DraftClosed(closed.status())),
        })?
    }

    /// Apply a write to the working value.
    ///
    /// # Panics
    ///
    /// Panics if the draft is no longer open, or if called from inside one of
    /// this draft's own closures. Async legs that may outlive their commit
    /// window should use [`Draft::try_modify`].
    pub fn modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        match self.try_modify(f) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// A cheap snapshot of the working value as it stands now.
    pub fn snapshot(&self) -> StoreResult<Arc<T>> {
        self.access(|slot| match slot {
            Slot::Open(working) => Ok(Arc::clone(working)),
            closed => Err(StoreError::DraftClosed(closed.status())),
        })?
    }

    /// Take the working value out and mark the draft committed.
    ///
    /// Returns `None` if the draft was already closed.
    pub(crate) fn freeze(&self) -> Option<Arc<T>> {
        let mut slot = self.inner.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Committed) {
            Slot::Open(working) => Some(working),
            closed => {
                *slot = closed;
                None
            }
        }
    }

    /// Drop the working value. Returns `true` if the draft was open.
    pub(crate) fn discard(&self) -> bool {
        let mut slot = self.inner.slot.lock();
        if matches!(*slot, Slot::Open(_)) {
            *slot = Slot::Discarded;
            true
        } else {
            false
        }
    }

    /// Handle identity.
    pub(crate) fn same_as(&self, other: &Draft<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Draft<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> fmt::Debug for Draft<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Draft")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish()
    }
}
