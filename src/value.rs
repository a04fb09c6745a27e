//! Runtime values held in local slots and on operand stacks.

use std::fmt;

/// Handle to an array allocated in a run's [`ArrayStore`](crate::core::ArrayStore).
///
/// Handles are plain indices; two handles are the same array exactly when
/// they compare equal, regardless of the array contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayRef(pub(crate) u32);

impl ArrayRef {
    /// Numeric identity of the array within its run.
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "array#{}", self.0)
    }
}

/// Tagged 32-bit value used by the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Array(ArrayRef),
}

impl Value {
    pub fn as_int(self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(v),
            Value::Array(_) => None,
        }
    }

    pub fn as_array(self) -> Option<ArrayRef> {
        match self {
            Value::Array(r) => Some(r),
            Value::Int(_) => None,
        }
    }

    /// Short type name used in fault messages.
    pub fn type_name(self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Array(_) => "array",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<ArrayRef> for Value {
    fn from(r: ArrayRef) -> Self {
        Value::Array(r)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Array(r) => write!(f, "{r}"),
        }
    }
}
