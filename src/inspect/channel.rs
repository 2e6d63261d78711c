use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::info;

use crate::error::InspectError;

/// Options passed to [`InspectionExtension::connect`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectOptions {
    /// Instance name shown by the inspector.
    pub name: String,
    /// How many past actions the inspector keeps.
    pub max_age: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            name: "draftstore".to_string(),
            max_age: 50,
        }
    }
}

/// What the inspector receives for one committed update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InspectedAction {
    #[serde(rename = "type")]
    pub label: String,
    pub args: Vec<serde_json::Value>,
}

/// A live connection to an inspector.
pub trait InspectionChannel: Send + Sync {
    /// Announce the connection.
    fn init(&self);

    /// Forward one committed update.
    fn send(&self, action: &InspectedAction, state: &serde_json::Value);
}

/// Entry point of an inspector provided by the host environment.
pub trait InspectionExtension: Send + Sync {
    fn connect(&self, options: &ConnectOptions) -> Arc<dyn InspectionChannel>;
}

static EXTENSION: OnceLock<Arc<dyn InspectionExtension>> = OnceLock::new();

/// Install the process-wide inspection extension.
///
/// Only the first call succeeds; bridges built afterwards pick it up.
pub fn install_extension(extension: Arc<dyn InspectionExtension>) -> Result<(), InspectError> {
    EXTENSION
        .set(extension)
        .map_err(|_| InspectError::AlreadyInstalled)
}

/// The process-wide inspection extension, if one was installed.
pub fn installed_extension() -> Option<Arc<dyn InspectionExtension>> {
    EXTENSION.get().cloned()
}

/// An extension that writes every update to the `tracing` log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogExtension;

struct LogChannel {
    options: ConnectOptions,
}

impl InspectionExtension for LogExtension {
    fn connect(&self, options: &ConnectOptions) -> Arc<dyn InspectionChannel> {
        Arc::new(LogChannel {
            options: options.clone(),
        })
    }
}

impl InspectionChannel for LogChannel {
    fn init(&self) {
        info!(
            inspector = %self.options.name,
            max_age = self.options.max_age,
            "inspector connected"
        );
    }

    fn send(&self, action: &InspectedAction, state: &serde_json::Value) {
        info!(
            inspector = %self.options.name,
            action = %action.label,
            args = %serde_json::Value::from(action.args.clone()),
            %state,
            "state changed"
        );
    }
}
