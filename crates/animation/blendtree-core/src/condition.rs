//! Comparisons between a parameter's live value and a target value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AnimError;
use crate::ids::Uid;
use crate::parameter::{check_type, ParamType, Parameter};
use crate::value::Value;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareType {
    Greater,
    Less,
    Equal,
    NotEqual,
}

impl CompareType {
    /// Comparisons defined for a parameter type.
    pub fn supported_for(kind: ParamType) -> &'static [CompareType] {
        match kind {
            ParamType::Bool | ParamType::Trigger => &[CompareType::Equal],
            ParamType::Float => &[CompareType::Greater, CompareType::Less],
            ParamType::Int => &[
                CompareType::Greater,
                CompareType::Less,
                CompareType::Equal,
                CompareType::NotEqual,
            ],
        }
    }

    #[inline]
    pub fn is_supported_for(self, kind: ParamType) -> bool {
        Self::supported_for(kind).contains(&self)
    }

    #[inline]
    fn apply<T: PartialOrd>(self, live: T, target: T) -> bool {
        match self {
            CompareType::Greater => live > target,
            CompareType::Less => live < target,
            CompareType::Equal => live == target,
            CompareType::NotEqual => live != target,
        }
    }
}

impl fmt::Display for CompareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompareType::Greater => "GREATER",
            CompareType::Less => "LESS",
            CompareType::Equal => "EQUAL",
            CompareType::NotEqual => "NOT_EQUAL",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub id: Uid,
    pub param_id: Uid,
    pub compare: CompareType,
    pub kind: ParamType,
    pub value: Value,
    /// Index into the tree's parameter array, set at bind time.
    pub(crate) param_index: Option<usize>,
}

impl Condition {
    /// Build a condition against `param`. Trigger conditions always target
    /// `true`.
    pub fn new(param: &Parameter, info: ConditionInfo) -> Result<Self, AnimError> {
        if !info.compare.is_supported_for(param.kind) {
            return Err(AnimError::UnsupportedComparison {
                param_type: param.kind.to_string(),
                comparison: info.compare.to_string(),
            });
        }
        let value = match (param.kind, info.value) {
            (ParamType::Trigger, _) => Value::Bool(true),
            (ParamType::Bool, None) => Value::Bool(true),
            (kind, None) => kind.default_value(),
            (kind, Some(value)) => {
                check_type(kind, &value)?;
                value
            }
        };
        Ok(Self {
            id: Uid::generate(),
            param_id: param.id,
            compare: info.compare,
            kind: param.kind,
            value,
            param_index: None,
        })
    }

    #[inline]
    pub fn param_index(&self) -> Option<usize> {
        self.param_index
    }

    pub(crate) fn bind(&mut self, index: Option<usize>) {
        self.param_index = index;
    }

    /// Evaluate as `live OP target` against a parameter array laid out like
    /// the tree's. Unbound or stale conditions never hold.
    pub fn evaluate(&self, params: &[Parameter]) -> bool {
        let Some(param) = self.param_index.and_then(|i| params.get(i)) else {
            return false;
        };
        if param.id != self.param_id || !self.compare.is_supported_for(self.kind) {
            return false;
        }
        match (&param.value, &self.value) {
            (Value::Bool(live), Value::Bool(target)) => self.compare.apply(live, target),
            (Value::Int(live), Value::Int(target)) => self.compare.apply(live, target),
            (Value::Float(live), Value::Float(target)) => self.compare.apply(live, target),
            _ => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConditionInfo {
    /// Name of the parameter to compare against.
    pub parameter: String,
    pub compare: CompareType,
    pub value: Option<Value>,
}

impl ConditionInfo {
    pub fn new(parameter: impl Into<String>, compare: CompareType) -> Self {
        Self {
            parameter: parameter.into(),
            compare,
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }
}
