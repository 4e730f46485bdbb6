//! Named typed variables that gate transitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AnimError;
use crate::ids::Uid;
use crate::value::{Value, ValueKind};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParamType {
    Bool,
    /// Boolean that is consumed by the transition it enables.
    Trigger,
    Int,
    Float,
}

impl ParamType {
    /// Runtime value kind carried by parameters of this type.
    #[inline]
    pub fn value_kind(self) -> ValueKind {
        match self {
            ParamType::Bool | ParamType::Trigger => ValueKind::Bool,
            ParamType::Int => ValueKind::Int,
            ParamType::Float => ValueKind::Float,
        }
    }

    #[inline]
    pub fn accepts(self, value: &Value) -> bool {
        value.kind() == self.value_kind()
    }

    #[inline]
    pub fn default_value(self) -> Value {
        Value::default_for(self.value_kind())
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Bool => "BOOL",
            ParamType::Trigger => "TRIGGER",
            ParamType::Int => "INT",
            ParamType::Float => "FLOAT",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub id: Uid,
    pub name: String,
    pub kind: ParamType,
    pub value: Value,
}

impl Parameter {
    pub fn new(info: ParameterInfo) -> Result<Self, AnimError> {
        let value = match info.value {
            Some(value) => {
                check_type(info.kind, &value)?;
                value
            }
            None => info.kind.default_value(),
        };
        Ok(Self {
            id: Uid::generate(),
            name: info.name,
            kind: info.kind,
            value,
        })
    }

    /// Assign a live value; the value must match the declared type.
    pub fn set(&mut self, value: Value) -> Result<(), AnimError> {
        check_type(self.kind, &value)?;
        self.value = value;
        Ok(())
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.kind == ParamType::Trigger && self.value == Value::Bool(true)
    }

    /// Reset a trigger after a transition used it.
    #[inline]
    pub fn consume(&mut self) {
        if self.kind == ParamType::Trigger {
            self.value = Value::Bool(false);
        }
    }
}

#[derive(Clone, Debug)]
pub struct ParameterInfo {
    pub name: String,
    pub kind: ParamType,
    /// Initial value; defaults to false/0/0.0.
    pub value: Option<Value>,
}

impl ParameterInfo {
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }
}

pub(crate) fn check_type(kind: ParamType, value: &Value) -> Result<(), AnimError> {
    if kind.accepts(value) {
        Ok(())
    } else {
        Err(AnimError::type_mismatch(kind, value.kind()))
    }
}
