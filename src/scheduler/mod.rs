//! Deferred continuations.
//!
//! The store never decides on its own when an asynchronous draft ends. It
//! hands continuations to a [`Scheduler`] and lets the host decide what a
//! "turn" is. [`TurnQueue`] is the deterministic implementation used by tests
//! and single-threaded hosts.

mod scheduler;

pub use scheduler::{defer_after, Scheduler, Task, TurnQueue};
