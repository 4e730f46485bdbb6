//! Timestamped payloads: keyframes on timelines and script events on
//! animations.

use serde::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct KeyFrame {
    pub time: f32,
    pub value: Value,
}

impl KeyFrame {
    pub fn new(time: f32, value: impl Into<Value>) -> Self {
        Self {
            time,
            value: value.into(),
        }
    }
}

/// Callable descriptor handed to the host's script layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptFunctionInfo {
    #[serde(rename = "classNamespace")]
    pub class_namespace: String,
    #[serde(rename = "className")]
    pub class_name: String,
    #[serde(rename = "functionName")]
    pub function_name: String,
}

impl ScriptFunctionInfo {
    pub fn new(
        class_namespace: impl Into<String>,
        class_name: impl Into<String>,
        function_name: impl Into<String>,
    ) -> Self {
        Self {
            class_namespace: class_namespace.into(),
            class_name: class_name.into(),
            function_name: function_name.into(),
        }
    }

    /// `Namespace.Class.Function`, skipping empty segments.
    pub fn qualified_name(&self) -> String {
        [
            self.class_namespace.as_str(),
            self.class_name.as_str(),
            self.function_name.as_str(),
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(".")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScriptEvent {
    pub time: f32,
    pub function: ScriptFunctionInfo,
}

impl ScriptEvent {
    pub fn new(time: f32, function: ScriptFunctionInfo) -> Self {
        Self { time, function }
    }
}

/// Insert before the first element with a strictly greater time, so equal
/// times keep insertion order. Returns the insertion index.
pub(crate) fn insert_by_time<T>(items: &mut Vec<T>, item: T, time_of: impl Fn(&T) -> f32) -> usize {
    let time = time_of(&item);
    let index = items
        .iter()
        .position(|existing| time_of(existing) > time)
        .unwrap_or(items.len());
    items.insert(index, item);
    index
}
