//! The state store and its draft protocol.
//!
//! The store owns one immutable state value at a time. Writers never touch
//! it directly; they receive a [`Draft`](crate::Draft), and the store freezes
//! that draft into the next state and notifies observers once per commit.

mod store;

pub use store::{handler, StateChangeHandler, Store, StoreConfig};
