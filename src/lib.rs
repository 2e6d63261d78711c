//! # Draftstore
//!
//! An immutable state container with copy-on-write drafts.
//!
//! Readers get the current state as an `Arc<T>` that never changes under
//! them. Writers receive a [`Draft`], write into it, and the store freezes the
//! draft into the next state, sharing every part of the old state the writer
//! did not touch.
//!
//! ## Updates
//!
//! - [`Store::update`] / [`Store::try_update`] - synchronous mutation. Nested
//!   updates write into the outer draft; only the outermost call commits.
//! - [`Store::update_async`] - mutation whose result is a future; whatever
//!   draft is open when the future completes is committed (or discarded on
//!   error).
//! - [`Store::start_async_draft`] - a draft for one leg of an async action,
//!   committed by the store's [`Scheduler`] two turns after it was opened.
//!
//! ## Notifications
//!
//! Every commit calls each subscribed [`StateChangeHandler`] once, in
//! subscription order, with the new state and the [`ActionInfo`] that caused
//! it. The [`inspect`] module forwards that stream to an external inspector.

pub mod action;
pub mod draft;
pub mod error;
pub mod inspect;
pub mod scheduler;
pub mod store;
pub mod tree;

// Re-export main types for convenience
pub use action::ActionInfo;
pub use draft::{Draft, DraftStatus};
pub use error::{InspectError, StoreError, StoreResult, TreeError};
pub use scheduler::{Scheduler, Task, TurnQueue};
pub use store::{handler, StateChangeHandler, Store, StoreConfig};
pub use tree::Node;
