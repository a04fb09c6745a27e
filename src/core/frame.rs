//! Per-invocation storage: local slots plus an operand stack.

use crate::fault::ExecError;
use crate::table::MethodId;
use crate::value::{ArrayRef, Value};

/// State of one active method invocation.
#[derive(Debug, Clone)]
pub struct Frame {
    method: MethodId,
    pub(crate) pc: usize,
    locals: Vec<Value>,
    stack: Vec<Value>,
}

impl Frame {
    /// Create a frame for `method` with `args` bound to the first slots.
    ///
    /// Remaining slots start at zero. The caller guarantees
    /// `args.len() <= slot_count`; [`CallStack::enter`](crate::core::CallStack::enter)
    /// checks it for entry frames and the loader enforces it for calls.
    pub(crate) fn new(method: MethodId, slot_count: u16, args: &[Value]) -> Self {
        let mut frame = Self {
            method,
            pc: 0,
            locals: Vec::new(),
            stack: Vec::new(),
        };
        frame.reset(method, slot_count);
        frame.locals[..args.len()].copy_from_slice(args);
        frame
    }

    /// Reinitialize a recycled frame for a new invocation.
    pub(crate) fn reset(&mut self, method: MethodId, slot_count: u16) {
        self.method = method;
        self.pc = 0;
        self.locals.clear();
        self.locals.resize(usize::from(slot_count), Value::default());
        self.stack.clear();
    }

    /// Move the top `count` operands into `callee`'s first local slots, in push order.
    pub(crate) fn pass_args(&mut self, count: usize, callee: &mut Frame) -> Result<(), ExecError> {
        let base = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or(ExecError::StackUnderflow)?;
        for (slot, value) in callee.locals.iter_mut().zip(self.stack.drain(base..)) {
            *slot = value;
        }
        Ok(())
    }

    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, ExecError> {
        self.stack.pop().ok_or(ExecError::StackUnderflow)
    }

    /// Pop an operand that must be an integer.
    pub fn pop_int(&mut self) -> Result<i32, ExecError> {
        match self.pop()? {
            Value::Int(v) => Ok(v),
            other => Err(ExecError::TypeMismatch {
                expected: "int",
                found: other.type_name(),
            }),
        }
    }

    /// Pop an operand that must be an array reference.
    pub fn pop_array(&mut self) -> Result<ArrayRef, ExecError> {
        match self.pop()? {
            Value::Array(r) => Ok(r),
            other => Err(ExecError::TypeMismatch {
                expected: "array",
                found: other.type_name(),
            }),
        }
    }

    pub fn load_local(&self, slot: u16) -> Result<Value, ExecError> {
        self.locals
            .get(usize::from(slot))
            .copied()
            .ok_or(ExecError::InvalidSlot {
                slot,
                count: self.locals.len(),
            })
    }

    pub fn store_local(&mut self, slot: u16, value: Value) -> Result<(), ExecError> {
        let count = self.locals.len();
        let cell = self
            .locals
            .get_mut(usize::from(slot))
            .ok_or(ExecError::InvalidSlot { slot, count })?;
        *cell = value;
        Ok(())
    }

    pub fn locals(&self) -> &[Value] {
        &self.locals
    }

    /// Operand stack, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }
}
