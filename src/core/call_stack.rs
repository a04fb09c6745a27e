//! Bounded stack of frames for nested invocations.
//!
//! Frames live in a vector indexed by depth and are recycled: returning from
//! a call only lowers `depth`, and the next call at that depth reuses the
//! frame's buffers. Recursion is limited by `max_depth`, never by the host
//! stack.

use crate::core::frame::Frame;
use crate::fault::ExecError;
use crate::table::MethodId;
use crate::value::Value;

pub struct CallStack {
    frames: Vec<Frame>,
    depth: usize,
    max_depth: usize,
    high_water: usize,
}

impl CallStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::with_capacity(max_depth.min(64)),
            depth: 0,
            max_depth,
            high_water: 0,
        }
    }

    /// Drop all active frames, keeping their buffers for reuse.
    pub fn clear(&mut self) {
        self.depth = 0;
        self.high_water = 0;
    }

    /// Push the entry frame of a run. `args` must fit in `slot_count` slots.
    pub fn enter(&mut self, method: MethodId, slot_count: u16, args: &[Value]) -> Result<(), ExecError> {
        if self.depth >= self.max_depth {
            return Err(ExecError::StackOverflow(self.max_depth));
        }
        if args.len() > usize::from(slot_count) {
            return Err(ExecError::InvalidSlot {
                slot: slot_count,
                count: usize::from(slot_count),
            });
        }
        let frame = Frame::new(method, slot_count, args);
        if self.depth < self.frames.len() {
            self.frames[self.depth] = frame;
        } else {
            self.frames.push(frame);
        }
        self.grow();
        Ok(())
    }

    /// Call `method` from the current frame, moving `argc` operands into its locals.
    ///
    /// On success the caller's pc already points past the call, so a later
    /// [`pop_frame`](Self::pop_frame) resumes it at the next instruction. On
    /// failure nothing is modified.
    pub fn push_call(
        &mut self,
        method: MethodId,
        slot_count: u16,
        argc: usize,
    ) -> Result<(), ExecError> {
        if self.depth >= self.max_depth {
            return Err(ExecError::StackOverflow(self.max_depth));
        }
        if self.current().stack().len() < argc {
            return Err(ExecError::StackUnderflow);
        }

        if self.frames.len() == self.depth {
            self.frames.push(Frame::new(method, 0, &[]));
        }
        let (lower, upper) = self.frames.split_at_mut(self.depth);
        let caller = &mut lower[self.depth - 1];
        let callee = &mut upper[0];

        callee.reset(method, slot_count);
        caller.pass_args(argc, callee)?;
        caller.pc += 1;
        self.grow();
        Ok(())
    }

    /// Pop the current frame. Returns `true` when the call stack is now empty.
    pub fn pop_frame(&mut self) -> bool {
        self.depth = self.depth.saturating_sub(1);
        self.depth == 0
    }

    /// Innermost active frame. Panics when no frame is active.
    pub fn current(&self) -> &Frame {
        &self.frames[self.depth - 1]
    }

    /// Innermost active frame. Panics when no frame is active.
    pub fn current_mut(&mut self) -> &mut Frame {
        &mut self.frames[self.depth - 1]
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Deepest nesting reached since the last [`clear`](Self::clear).
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Active frames, outermost first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames[..self.depth]
    }

    fn grow(&mut self) {
        self.depth += 1;
        self.high_water = self.high_water.max(self.depth);
    }
}
