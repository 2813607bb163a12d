//! Host argument marshaling.
//!
//! The host hands the bridge loosely-typed values; each operation declares a
//! positional contract (index, name, expected kind, required/optional) and
//! extracts strongly-typed native values through [`Args`]. A wrong-typed or
//! missing argument fails with [`BridgeError::BadArgument`] naming the
//! parameter, before any native call is attempted. Integers widen to doubles;
//! no other numeric coercion happens.

use crate::errors::{BridgeError, Result};
use crate::registry::{self, HandleId, HandleKind};

/// A host-side call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Array(Vec<Value>),
    Handle(HandleId),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<HandleId> for Value {
    fn from(v: HandleId) -> Self {
        Value::Handle(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Handle(_) => "handle",
        }
    }

    fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            // The host's native numeric widening.
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

fn bad(name: &'static str, message: impl Into<String>) -> BridgeError {
    BridgeError::BadArgument {
        name,
        message: message.into(),
    }
}

/// Positional argument list for one host call.
pub struct Args<'a> {
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Args { values }
    }

    fn required(&self, idx: usize, name: &'static str) -> Result<&'a Value> {
        match self.values.get(idx) {
            Some(Value::Null) | None => Err(bad(name, format!("argument {idx} is required"))),
            Some(v) => Ok(v),
        }
    }

    fn optional(&self, idx: usize) -> Option<&'a Value> {
        match self.values.get(idx) {
            Some(Value::Null) | None => None,
            Some(v) => Some(v),
        }
    }

    pub fn str(&self, idx: usize, name: &'static str) -> Result<&'a str> {
        match self.required(idx, name)? {
            Value::Str(s) => Ok(s),
            other => Err(bad(name, format!("must be a string, got {}", other.type_name()))),
        }
    }

    pub fn opt_str(&self, idx: usize, name: &'static str) -> Result<Option<&'a str>> {
        match self.optional(idx) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s)),
            Some(other) => Err(bad(name, format!("must be a string, got {}", other.type_name()))),
        }
    }

    pub fn int(&self, idx: usize, name: &'static str) -> Result<i64> {
        match self.required(idx, name)? {
            Value::Int(v) => Ok(*v),
            other => Err(bad(
                name,
                format!("must be an integer, got {}", other.type_name()),
            )),
        }
    }

    pub fn opt_int(&self, idx: usize, name: &'static str, default: i64) -> Result<i64> {
        match self.optional(idx) {
            None => Ok(default),
            Some(Value::Int(v)) => Ok(*v),
            Some(other) => Err(bad(
                name,
                format!("must be an integer, got {}", other.type_name()),
            )),
        }
    }

    pub fn double(&self, idx: usize, name: &'static str) -> Result<f64> {
        let v = self.required(idx, name)?;
        v.as_double()
            .ok_or_else(|| bad(name, format!("must be a number, got {}", v.type_name())))
    }

    pub fn opt_double(&self, idx: usize, name: &'static str, default: f64) -> Result<f64> {
        match self.optional(idx) {
            None => Ok(default),
            Some(v) => v
                .as_double()
                .ok_or_else(|| bad(name, format!("must be a number, got {}", v.type_name()))),
        }
    }

    pub fn boolean(&self, idx: usize, name: &'static str) -> Result<bool> {
        match self.required(idx, name)? {
            Value::Bool(v) => Ok(*v),
            other => Err(bad(
                name,
                format!("must be a boolean, got {}", other.type_name()),
            )),
        }
    }

    /// Extracts an array of doubles, optionally of a fixed length.
    pub fn double_array(
        &self,
        idx: usize,
        name: &'static str,
        expected_len: Option<usize>,
    ) -> Result<Vec<f64>> {
        let items = match self.required(idx, name)? {
            Value::Array(items) => items,
            other => Err(bad(name, format!("must be an array, got {}", other.type_name())))?,
        };
        if let Some(len) = expected_len {
            if items.len() != len {
                return Err(bad(
                    name,
                    format!("must contain {} elements, got {}", len, items.len()),
                ));
            }
        }
        items
            .iter()
            .map(|v| {
                v.as_double()
                    .ok_or_else(|| bad(name, "must only contain numbers".to_string()))
            })
            .collect()
    }

    /// Extracts an optional array of strings; absent means empty.
    pub fn opt_str_array(&self, idx: usize, name: &'static str) -> Result<Vec<&'a str>> {
        let items = match self.optional(idx) {
            None => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(bad(
                    name,
                    format!("must be an array, got {}", other.type_name()),
                ))
            }
        };
        items
            .iter()
            .map(|v| match v {
                Value::Str(s) => Ok(s.as_str()),
                other => Err(bad(
                    name,
                    format!("must only contain strings, got {}", other.type_name()),
                )),
            })
            .collect()
    }

    /// Extracts a handle argument without checking its class or liveness.
    /// Disposal and liveness queries accept retired handles.
    pub fn any_handle(&self, idx: usize, name: &'static str) -> Result<HandleId> {
        match self.required(idx, name)? {
            Value::Handle(id) => Ok(*id),
            other => Err(bad(
                name,
                format!("must be a handle, got {}", other.type_name()),
            )),
        }
    }

    /// Extracts a handle argument and checks its wrapper class tag.
    pub fn handle(&self, idx: usize, name: &'static str, kind: HandleKind) -> Result<HandleId> {
        let id = match self.required(idx, name)? {
            Value::Handle(id) => *id,
            other => Err(bad(
                name,
                format!("must be a {} handle, got {}", kind.name(), other.type_name()),
            ))?,
        };
        match registry::kind_of(id) {
            Some(k) if k == kind => Ok(id),
            Some(k) => Err(bad(
                name,
                format!("must be a {} handle, got a {} handle", kind.name(), k.name()),
            )),
            None => Err(BridgeError::UseAfterDispose { id }),
        }
    }
}
