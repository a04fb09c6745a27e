//! Per-run interpreter configuration.

use bitflags::bitflags;

#[cfg(feature = "serde-program")]
use serde::{Deserialize, Serialize};

use crate::core::ArrayStore;

bitflags! {
    /// Categories of `trace!` output emitted while a run executes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde-program", derive(Serialize, Deserialize))]
    pub struct TraceFlags: u8 {
        const INSTRUCTIONS = 0x01;
        const CALLS = 0x02;
        const ARRAYS = 0x04;
    }
}

/// Limits and diagnostics for a single interpreter run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-program", derive(Serialize, Deserialize), serde(default))]
pub struct VmConfig {
    /// Deepest allowed nesting of frames, entry frame included.
    pub max_call_depth: usize,
    /// Largest array a single allocation may create, in elements.
    pub max_array_length: usize,
    /// Elements all live arrays may hold together, host arrays included.
    pub max_heap_elements: usize,
    /// Instructions a run may execute before faulting with `BudgetExceeded`.
    pub instruction_budget: Option<u64>,
    pub trace: TraceFlags,
}

impl VmConfig {
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_array_length(mut self, length: usize) -> Self {
        self.max_array_length = length;
        self
    }

    pub fn with_max_heap_elements(mut self, elements: usize) -> Self {
        self.max_heap_elements = elements;
        self
    }

    pub fn with_instruction_budget(mut self, budget: u64) -> Self {
        self.instruction_budget = Some(budget);
        self
    }

    pub fn with_trace(mut self, trace: TraceFlags) -> Self {
        self.trace = trace;
        self
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
            max_array_length: ArrayStore::DEFAULT_MAX_LENGTH,
            max_heap_elements: ArrayStore::DEFAULT_MAX_ELEMENTS,
            instruction_budget: None,
            trace: TraceFlags::empty(),
        }
    }
}
