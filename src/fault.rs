//! Fault taxonomy shared by the loader and the interpreter loop.
//!
//! Instructions fail with an [`ExecError`], which carries only what the
//! instruction itself knows. The interpreter loop wraps it into a [`Fault`]
//! by attaching the executing method and instruction index. Load-time
//! problems are reported as [`LoadError`] before any run starts.

use std::fmt;

use thiserror::Error;

/// Category of a reported fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    StackUnderflow,
    InvalidSlot,
    IndexOutOfBounds,
    InvalidLength,
    ArithmeticError,
    UnknownMethod,
    ProgramError,
    StackOverflow,
    TypeMismatch,
    BudgetExceeded,
    Cancelled,
}

impl FaultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::StackUnderflow => "StackUnderflow",
            FaultKind::InvalidSlot => "InvalidSlot",
            FaultKind::IndexOutOfBounds => "IndexOutOfBounds",
            FaultKind::InvalidLength => "InvalidLength",
            FaultKind::ArithmeticError => "ArithmeticError",
            FaultKind::UnknownMethod => "UnknownMethod",
            FaultKind::ProgramError => "ProgramError",
            FaultKind::StackOverflow => "StackOverflow",
            FaultKind::TypeMismatch => "TypeMismatch",
            FaultKind::BudgetExceeded => "BudgetExceeded",
            FaultKind::Cancelled => "Cancelled",
        }
    }

    /// Whether the fault is detected while loading rather than while running.
    pub fn is_load_time(self) -> bool {
        matches!(self, FaultKind::UnknownMethod | FaultKind::ProgramError)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure raised by a single instruction or run-level check.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("pop from empty operand stack")]
    StackUnderflow,
    #[error("local slot {slot} outside 0..{count}")]
    InvalidSlot { slot: u16, count: usize },
    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i32, length: usize },
    #[error("invalid array length {length} (limit {limit})")]
    InvalidLength { length: i64, limit: usize },
    #[error("allocating {requested} element(s) with {in_use} in use exceeds the heap limit of {limit}")]
    HeapExhausted {
        requested: usize,
        in_use: usize,
        limit: usize,
    },
    #[error("{0} by zero")]
    DivideByZero(&'static str),
    #[error("call depth would exceed {0}")]
    StackOverflow(usize),
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("array handle {0} does not belong to this run")]
    DanglingArray(u32),
    #[error("no method `{name}` taking {arity} argument(s)")]
    UnknownMethod { name: String, arity: usize },
    #[error("instruction budget of {0} exhausted")]
    BudgetExceeded(u64),
    #[error("run cancelled by host")]
    Cancelled,
}

impl ExecError {
    pub fn kind(&self) -> FaultKind {
        match self {
            ExecError::StackUnderflow => FaultKind::StackUnderflow,
            ExecError::InvalidSlot { .. } => FaultKind::InvalidSlot,
            ExecError::IndexOutOfBounds { .. } => FaultKind::IndexOutOfBounds,
            ExecError::InvalidLength { .. } | ExecError::HeapExhausted { .. } => {
                FaultKind::InvalidLength
            }
            ExecError::DivideByZero(_) => FaultKind::ArithmeticError,
            ExecError::StackOverflow(_) => FaultKind::StackOverflow,
            ExecError::TypeMismatch { .. } | ExecError::DanglingArray(_) => {
                FaultKind::TypeMismatch
            }
            ExecError::UnknownMethod { .. } => FaultKind::UnknownMethod,
            ExecError::BudgetExceeded(_) => FaultKind::BudgetExceeded,
            ExecError::Cancelled => FaultKind::Cancelled,
        }
    }
}

/// Terminal error reported to the host when a run stops early.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} in `{method}` at instruction {index}: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    /// Name of the method executing when the fault was raised.
    pub method: String,
    /// Index of the faulting instruction within that method.
    pub index: usize,
    pub message: String,
}

impl Fault {
    pub(crate) fn at(err: ExecError, method: &str, index: usize) -> Self {
        Self {
            kind: err.kind(),
            method: method.to_string(),
            index,
            message: err.to_string(),
        }
    }
}

/// Problem found while building a [`MethodTable`](crate::table::MethodTable).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} in `{method}` at instruction {index}: {message}")]
pub struct LoadError {
    pub kind: FaultKind,
    pub method: String,
    pub index: usize,
    pub message: String,
}

impl LoadError {
    pub(crate) fn program(method: &str, index: usize, message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::ProgramError,
            method: method.to_string(),
            index,
            message: message.into(),
        }
    }

    pub(crate) fn unknown_method(method: &str, index: usize, message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::UnknownMethod,
            method: method.to_string(),
            index,
            message: message.into(),
        }
    }
}

impl From<LoadError> for Fault {
    fn from(err: LoadError) -> Self {
        Self {
            kind: err.kind,
            method: err.method,
            index: err.index,
            message: err.message,
        }
    }
}
