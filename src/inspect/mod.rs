//! Bridge from the store's notification stream to an external inspector.
//!
//! The bridge is an ordinary subscriber. It labels each committed update,
//! serializes the new state and forwards both to an [`InspectionChannel`].
//! The channel comes from an [`InspectionExtension`], which the host either
//! installs process-wide with [`install_extension`] or hands to
//! [`InspectorBridge::with_extension`] directly. When no extension is
//! available the bridge does nothing.

mod bridge;
mod channel;

pub use bridge::{action_label, InspectorBridge};
pub use channel::{
    install_extension, installed_extension, ConnectOptions, InspectedAction, InspectionChannel,
    InspectionExtension, LogExtension,
};
