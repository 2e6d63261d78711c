//! Async legs: scheduled commits, pending results and stale drafts.

use draftstore::{handler, ActionInfo, DraftStatus, Scheduler, Store, StoreError, TurnQueue};
use futures::channel::oneshot;
use futures::executor::block_on;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq)]
struct Data {
    loading: bool,
    value: i32,
    note: String,
}

type Seen = Arc<Mutex<Vec<(Arc<Data>, ActionInfo)>>>;

fn setup() -> (Store<Data>, Arc<TurnQueue>, Seen) {
    let queue = Arc::new(TurnQueue::new());
    let store = Store::new(Data::default(), queue.clone());
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    store.subscribe(handler(move |state: &Arc<Data>, action: &ActionInfo| {
        seen_clone.lock().push((state.clone(), action.clone()));
    }));
    (store, queue, seen)
}

fn load() -> ActionInfo {
    ActionInfo::new("data", "load")
}

#[test]
fn host_task_panic_does_not_strand_the_commit() {
    let (store, queue, seen) = setup();

    // A host task that, one turn later, schedules a failing task ahead of the commit.
    let host_queue = queue.clone();
    queue.defer(Box::new(move || {
        host_queue.defer(Box::new(|| panic!("host task failed")));
    }));

    let draft = store.start_async_draft(load()).unwrap();
    draft.modify(|s| s.value = 3);

    assert_eq!(queue.run_turn(), 2);
    let turn = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| queue.run_turn()));
    assert!(turn.is_err());
    assert!(store.has_open_draft());

    assert_eq!(queue.run_turn(), 1);
    assert_eq!(store.get_state().value, 3);
    assert!(!store.has_open_draft());
    assert_eq!(seen.lock().len(), 1);
    assert!(store.start_async_draft(load()).is_ok());
}

#[test]
fn async_draft_commits_after_two_turns() {
    let (store, queue, seen) = setup();
    let before = store.get_state();

    let draft = store.start_async_draft(load()).unwrap();
    draft.modify(|s| s.value = 7);

    assert_eq!(queue.run_turn(), 1);
    assert!(Arc::ptr_eq(&before, &store.get_state()));
    assert!(draft.is_open());
    assert!(seen.lock().is_empty());

    // Still inside the window: late writes of this leg are kept.
    draft.modify(|s| s.note = "late".to_string());

    assert_eq!(queue.run_turn(), 1);
    assert_eq!(store.get_state().value, 7);
    assert_eq!(store.get_state().note, "late");
    assert_eq!(draft.status(), DraftStatus::Committed);

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].1.is_async);
    assert_eq!(seen[0].1.name, "load");
}

#[test]
fn writes_after_commit_are_rejected() {
    let (store, queue, _seen) = setup();
    let draft = store.start_async_draft(load()).unwrap();
    queue.run_until_idle();

    assert_eq!(
        draft.try_modify(|s| s.value = 1),
        Err(StoreError::DraftClosed(DraftStatus::Committed))
    );
    assert_eq!(store.get_state().value, 0);
}

#[test]
fn sync_update_joins_open_async_draft() {
    let (store, queue, seen) = setup();
    let draft = store.start_async_draft(load()).unwrap();
    draft.modify(|s| s.loading = true);

    let joined = store.update(
        |d| {
            d.modify(|s| s.value = 3);
            d.id()
        },
        ActionInfo::new("data", "set"),
    );

    assert_eq!(joined, draft.id());
    assert!(seen.lock().is_empty());
    assert_eq!(store.get_state().value, 0);

    queue.run_until_idle();
    let state = store.get_state();
    assert!(state.loading);
    assert_eq!(state.value, 3);
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn pending_result_commits_last_leg_when_it_settles() {
    let (store, queue, seen) = setup();
    let (tx, rx) = oneshot::channel::<i32>();
    let leg_store = store.clone();

    let pending = store.update_async(
        move |draft| {
            draft.modify(|s| s.loading = true);
            async move {
                let value = rx.await.map_err(|_| "cancelled")?;
                let draft = leg_store.start_async_draft(load()).map_err(|_| "busy")?;
                draft.modify(|s| {
                    s.loading = false;
                    s.value = value;
                });
                Ok::<i32, &str>(value)
            }
        },
        load(),
    );

    // The synchronous leg is already committed when update_async returns.
    assert!(store.get_state().loading);
    assert_eq!(seen.lock().len(), 1);
    assert!(!seen.lock()[0].1.is_async);

    tx.send(42).unwrap();
    assert_eq!(block_on(pending), Ok(42));

    assert_eq!(store.get_state().value, 42);
    assert!(!store.get_state().loading);
    assert!(!store.has_open_draft());
    {
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].1.is_async);
    }

    // The scheduled commit of the settled draft finds nothing to do.
    queue.run_until_idle();
    assert_eq!(seen.lock().len(), 2);
}

#[test]
fn rejected_pending_result_discards_open_draft() {
    let (store, queue, seen) = setup();
    let leg_store = store.clone();
    let held = Arc::new(Mutex::new(None));
    let held_clone = held.clone();

    let pending = store.update_async(
        move |_| async move {
            let draft = leg_store.start_async_draft(load()).map_err(|_| "busy")?;
            draft.modify(|s| s.value = 99);
            *held_clone.lock() = Some(draft);
            Err::<(), &str>("network down")
        },
        load(),
    );
    assert_eq!(seen.lock().len(), 1);

    assert_eq!(block_on(pending), Err("network down"));
    assert!(!store.has_open_draft());

    let draft = held.lock().take().unwrap();
    assert_eq!(draft.status(), DraftStatus::Discarded);

    queue.run_until_idle();
    assert_eq!(store.get_state().value, 0);
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn stale_async_draft_commit_is_noop() {
    let (store, queue, seen) = setup();

    let stale = store.start_async_draft(load()).unwrap();
    stale.modify(|s| s.value = 1);

    // A nested update whose pending result fails discards the open draft.
    let failing = store.update_async(
        |d| {
            d.modify(|s| s.value = 2);
            async { Err::<(), &str>("failed") }
        },
        ActionInfo::new("data", "save"),
    );
    assert_eq!(block_on(failing), Err("failed"));
    assert_eq!(stale.status(), DraftStatus::Discarded);

    let fresh = store.start_async_draft(ActionInfo::new("data", "reload")).unwrap();
    fresh.modify(|s| s.note = "fresh".to_string());

    queue.run_until_idle();

    let state = store.get_state();
    assert_eq!(state.value, 0);
    assert_eq!(state.note, "fresh");
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1.name, "reload");
}

#[test]
fn pending_result_without_open_draft_commits_nothing_more() {
    let (store, queue, seen) = setup();

    let pending = store.update_async(
        |d| {
            d.modify(|s| s.value = 5);
            async { Ok::<(), ()>(()) }
        },
        ActionInfo::new("data", "set"),
    );
    assert_eq!(block_on(pending), Ok(()));
    queue.run_until_idle();

    assert_eq!(store.get_state().value, 5);
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn async_finalization_failure_is_swallowed() {
    let (store, queue, seen) = setup();
    store.subscribe(handler(|_: &Arc<Data>, _: &ActionInfo| panic!("observer failed")));
    let late = Arc::new(Mutex::new(0));
    let late_clone = late.clone();
    store.subscribe(handler(move |_: &Arc<Data>, _: &ActionInfo| {
        *late_clone.lock() += 1;
    }));

    let draft = store.start_async_draft(load()).unwrap();
    draft.modify(|s| s.value = 8);

    // Does not unwind out of the scheduler.
    queue.run_until_idle();

    // The commit itself went through; observers after the failing one were
    // skipped and nothing reports the failure.
    assert_eq!(store.get_state().value, 8);
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(*late.lock(), 0);

    // The store is not wedged with a stale open draft.
    assert!(!store.has_open_draft());
    assert!(store.start_async_draft(load()).is_ok());
}

#[test]
fn dropped_store_turns_scheduled_commit_into_noop() {
    let queue = Arc::new(TurnQueue::new());
    let store = Store::new(Data::default(), queue.clone());
    let draft = store.start_async_draft(load()).unwrap();
    draft.modify(|s| s.value = 1);

    drop(store);
    assert_eq!(queue.run_until_idle(), 2);
    assert!(draft.is_open());
}
