use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::channel::{
    installed_extension, ConnectOptions, InspectedAction, InspectionChannel, InspectionExtension,
};
use crate::action::ActionInfo;
use crate::error::InspectError;
use crate::store::{handler, StateChangeHandler, Store};

/// Label shown by the inspector: `[feature] name`, plus ` (async)` for
/// updates committed after a suspension point.
pub fn action_label(action: &ActionInfo) -> String {
    if action.is_async {
        format!("[{}] {} (async)", action.feature_name, action.name)
    } else {
        format!("[{}] {}", action.feature_name, action.name)
    }
}

/// Subscribes to a store and mirrors every commit to an inspector.
///
/// The bridge registers exactly one handler and removes it when dropped.
pub struct InspectorBridge<T: Clone + Send + Sync + 'static> {
    store: Store<T>,
    channel: Option<Arc<dyn InspectionChannel>>,
    handler: StateChangeHandler<T>,
}

impl<T: Clone + Serialize + Send + Sync + 'static> InspectorBridge<T> {
    /// Attach to `store` using the process-wide extension, if any.
    pub fn new(store: &Store<T>) -> Self {
        let options = ConnectOptions {
            name: store.config().name.clone(),
            ..ConnectOptions::default()
        };
        Self::with_extension(store, installed_extension(), &options)
    }

    /// Attach to `store` using an explicit extension.
    pub fn with_extension(
        store: &Store<T>,
        extension: Option<Arc<dyn InspectionExtension>>,
        options: &ConnectOptions,
    ) -> Self {
        let channel = match extension {
            Some(extension) => Some(extension.connect(options)),
            None => {
                debug!(inspector = %options.name, "no inspection extension available");
                None
            }
        };

        let forward = channel.clone();
        let handler = handler(move |state: &Arc<T>, action: &ActionInfo| {
            let Some(channel) = &forward else {
                return;
            };
            if let Err(err) = forward_update(channel.as_ref(), &**state, action) {
                warn!(action = %action.name, error = %err, "dropping inspector update");
            }
        });
        store.subscribe(handler.clone());

        Self {
            store: store.clone(),
            channel,
            handler,
        }
    }

    /// Announce the connection to the inspector.
    pub fn init(&self) {
        if let Some(channel) = &self.channel {
            channel.init();
        }
    }

    /// Whether an inspection channel was connected.
    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }
}

fn forward_update<T: Serialize>(
    channel: &dyn InspectionChannel,
    state: &T,
    action: &ActionInfo,
) -> Result<(), InspectError> {
    let state = serde_json::to_value(state)?;
    let inspected = InspectedAction {
        label: action_label(action),
        args: action.args.clone(),
    };
    channel.send(&inspected, &state);
    Ok(())
}

impl<T: Clone + Send + Sync + 'static> Drop for InspectorBridge<T> {
    fn drop(&mut self) {
        self.store.unsubscribe(&self.handler);
    }
}
