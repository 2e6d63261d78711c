use serde::{Deserialize, Serialize};

/// Describes the cause of a state transition.
///
/// Action info travels alongside a committed state to every observer. It is
/// never stored in the state itself.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInfo {
    /// Feature or namespace the action belongs to.
    pub feature_name: String,
    /// Name of the action within its feature.
    pub name: String,
    /// Positional arguments the action was invoked with.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    /// Set when the transition was committed after a suspension point.
    #[serde(default)]
    pub is_async: bool,
}

impl ActionInfo {
    /// Create action info with no arguments.
    pub fn new(feature_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            feature_name: feature_name.into(),
            name: name.into(),
            args: Vec::new(),
            is_async: false,
        }
    }

    /// Replace the positional arguments.
    pub fn with_args(mut self, args: Vec<serde_json::Value>) -> Self {
        self.args = args;
        self
    }

    /// Append one positional argument.
    pub fn with_arg(mut self, arg: impl Into<serde_json::Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The same action, tagged as asynchronous.
    pub fn into_async(mut self) -> Self {
        self.is_async = true;
        self
    }
}
