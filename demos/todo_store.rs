//! Demonstration of Store for managing complex state

use draftstore::inspect::{ConnectOptions, InspectorBridge, LogExtension};
use draftstore::{handler, ActionInfo, Draft, Store, StoreConfig, TurnQueue};
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Serialize)]
struct TodoItem {
    id: usize,
    title: String,
    completed: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
enum TodoFilter {
    All,
    Active,
    Completed,
}

#[derive(Clone, Debug, Serialize)]
struct AppState {
    todos: Arc<Vec<TodoItem>>,
    filter: TodoFilter,
}

impl AppState {
    fn new() -> Self {
        Self {
            todos: Arc::new(Vec::new()),
            filter: TodoFilter::All,
        }
    }

    fn filtered_todos(&self) -> Vec<&TodoItem> {
        match self.filter {
            TodoFilter::All => self.todos.iter().collect(),
            TodoFilter::Active => self.todos.iter().filter(|t| !t.completed).collect(),
            TodoFilter::Completed => self.todos.iter().filter(|t| t.completed).collect(),
        }
    }

    fn stats(&self) -> (usize, usize, usize) {
        let total = self.todos.len();
        let completed = self.todos.iter().filter(|t| t.completed).count();
        let active = total - completed;
        (total, active, completed)
    }
}

fn add_todo(store: &Store<AppState>, title: &str) {
    let info = ActionInfo::new("todos", "add").with_arg(title);
    let title = title.to_string();
    store.update(
        move |draft: &Draft<AppState>| {
            draft.modify(|state| {
                let todos = Arc::make_mut(&mut state.todos);
                let id = todos.len();
                todos.push(TodoItem {
                    id,
                    title,
                    completed: false,
                });
            })
        },
        info,
    );
}

fn toggle_todo(store: &Store<AppState>, id: usize) {
    store.update(
        |draft| {
            draft.modify(|state| {
                if let Some(todo) = Arc::make_mut(&mut state.todos).iter_mut().find(|t| t.id == id) {
                    todo.completed = !todo.completed;
                }
            })
        },
        ActionInfo::new("todos", "toggle").with_arg(id as u64),
    );
}

fn set_filter(store: &Store<AppState>, filter: TodoFilter) {
    let info = ActionInfo::new("todos", "setFilter").with_arg(format!("{filter:?}"));
    store.update(|draft| draft.modify(|state| state.filter = filter), info);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Store Example: Todo App ===\n");

    // Create store with initial state
    let store = Store::with_config(
        AppState::new(),
        Arc::new(TurnQueue::new()),
        StoreConfig {
            name: "todo-demo".to_string(),
        },
    );
    let _inspector = InspectorBridge::with_extension(
        &store,
        Some(Arc::new(LogExtension)),
        &ConnectOptions {
            name: "todo-demo".to_string(),
            ..ConnectOptions::default()
        },
    );

    // Subscribe to state changes
    println!("1. Setting up subscriber");
    store.subscribe(handler(|state: &Arc<AppState>, action: &ActionInfo| {
        let (total, active, completed) = state.stats();
        println!(
            "   [{}] Total: {}, Active: {}, Completed: {}",
            action.name, total, active, completed
        );
    }));

    // Add todos
    println!("\n2. Adding todos");
    add_todo(&store, "Learn Rust");
    add_todo(&store, "Build reactive library");
    add_todo(&store, "Write documentation");

    // Batch: nested updates commit once
    println!("\n3. Completing two todos in one action");
    let inner = store.clone();
    store.update(
        |_| {
            toggle_todo(&inner, 0);
            toggle_todo(&inner, 1);
        },
        ActionInfo::new("todos", "completeFirstTwo"),
    );

    // Change filter
    println!("\n4. Filtering to show only active todos");
    let before = store.get_state();
    set_filter(&store, TodoFilter::Active);
    let after = store.get_state();
    println!(
        "   todo list shared with previous state: {}",
        Arc::ptr_eq(&before.todos, &after.todos)
    );

    println!("\n5. Active todos:");
    store.read(|state| {
        for todo in state.filtered_todos() {
            println!("   [ ] {}", todo.title);
        }
    });

    // Final stats
    println!("\n6. Final statistics:");
    let (total, active, completed) = store.read(|state| state.stats());
    println!("   Total: {}", total);
    println!("   Active: {}", active);
    println!("   Completed: {}", completed);

    println!("\n✓ Example complete!");
}
