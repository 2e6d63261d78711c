//! An async action split into legs, with the store driven by a turn queue

use draftstore::inspect::{ConnectOptions, InspectorBridge, LogExtension};
use draftstore::{handler, ActionInfo, Store, TurnQueue};
use futures::channel::oneshot;
use futures::executor::block_on;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Default, Serialize)]
struct Profile {
    loading: bool,
    name: Option<String>,
    error: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    println!("=== Async Leg Example ===\n");

    let queue = Arc::new(TurnQueue::new());
    let store = Store::new(Profile::default(), queue.clone());
    let inspector =
        InspectorBridge::with_extension(&store, Some(Arc::new(LogExtension)), &ConnectOptions::default());
    inspector.init();

    store.subscribe(handler(|state: &Arc<Profile>, action: &ActionInfo| {
        println!(
            "   [{}{}] loading={} name={:?}",
            action.name,
            if action.is_async { " (async)" } else { "" },
            state.loading,
            state.name
        );
    }));

    // Simulated request answered from another thread.
    let (tx, rx) = oneshot::channel::<String>();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        let _ = tx.send("Ada".to_string());
    });

    println!("1. Starting fetchProfile");
    let leg_store = store.clone();
    let action = ActionInfo::new("profile", "fetch").with_arg(1);
    let pending = store.update_async(
        move |draft| {
            draft.modify(|p| p.loading = true);
            async move {
                let name = rx.await.map_err(|_| "request dropped".to_string())?;
                let leg = leg_store
                    .start_async_draft(ActionInfo::new("profile", "fetch"))
                    .map_err(|err| err.to_string())?;
                leg.modify(|p| {
                    p.loading = false;
                    p.name = Some(name);
                });
                Ok::<(), String>(())
            }
        },
        action,
    );

    println!("\n2. Awaiting the response");
    if let Err(err) = block_on(pending) {
        store.update(
            |draft| draft.modify(|p| p.error = Some(err)),
            ActionInfo::new("profile", "fail"),
        );
    }

    println!("\n3. Draining scheduled commits");
    let turns = queue.run_until_idle();
    println!("   ran {} turn(s)", turns);

    println!("\n4. Final state: {:?}", store.get_state());
    println!("\n✓ Example complete!");
}
