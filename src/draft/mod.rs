//! Mutable working views over the current state.
//!
//! A [`Draft`] starts as a pointer to the state it was opened from. The first
//! write clones the root (shallowly, through [`Arc::make_mut`](std::sync::Arc::make_mut)),
//! and anything below the root stays shared until it is itself written.

mod draft;

pub use draft::{Draft, DraftStatus};
