//! Metadata describing why a state transition happened.

mod action;

pub use action::ActionInfo;
