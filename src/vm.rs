// Copyright (C) 2025 Dayton Fishell
// Baseplate Bytecode Interpreter
// This file is part of Baseplate.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Baseplate VM: the fetch-decode-execute loop over a loaded [`MethodTable`].
//!
//! A [`BaseplateVm`] is one run scope. It borrows the read-only method table
//! and owns everything a run mutates (call stack and array store), so
//! independent VMs never observe each other and need no locking. Hosts that
//! want parallelism build one VM per thread over a shared table.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{Level, debug, log_enabled, trace, warn};

use crate::bytecode::Instruction;
use crate::config::{TraceFlags, VmConfig};
use crate::core::{ArrayStore, CallStack, Frame};
use crate::fault::{ExecError, Fault};
use crate::table::{LoadedMethod, MethodId, MethodTable};
use crate::value::Value;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run has started yet.
    Ready,
    Running,
    /// Transient while a callee frame is being pushed.
    Calling,
    /// Transient while a frame is popped and its result forwarded.
    Returning,
    /// The entry method returned.
    Halted,
    /// The run stopped on a fault.
    Faulted,
}

/// Execution statistics for the most recent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub instructions: u64,
    pub calls: u64,
    pub max_depth: usize,
    /// Arrays allocated by the run itself, host arrays excluded.
    pub arrays: usize,
}

/// Host-side switch that stops a run before its next instruction.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear a previous cancellation so the VM can run again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

enum Flow {
    Continue,
    Halt(Value),
}

/// Interpreter state for one run over a method table.
pub struct BaseplateVm<'t> {
    table: &'t MethodTable,
    config: VmConfig,
    calls: CallStack,
    arrays: ArrayStore,
    state: RunState,
    stats: RunStats,
    cancel: CancelHandle,
}

impl<'t> BaseplateVm<'t> {
    pub fn new(table: &'t MethodTable) -> Self {
        Self::with_config(table, VmConfig::default())
    }

    pub fn with_config(table: &'t MethodTable, config: VmConfig) -> Self {
        Self {
            table,
            calls: CallStack::new(config.max_call_depth),
            arrays: ArrayStore::with_limits(config.max_array_length, config.max_heap_elements),
            config,
            state: RunState::Ready,
            stats: RunStats::default(),
            cancel: CancelHandle::default(),
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Handle another thread can use to abort a run in progress.
    ///
    /// Cancellation stays in effect for every later run on this VM until
    /// [`CancelHandle::reset`] is called.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Allocate a host array, e.g. to pass as an argument.
    ///
    /// Host arrays outlive runs and stay readable through [`array`](Self::array)
    /// until [`reset_arrays`](Self::reset_arrays).
    pub fn alloc_array(&mut self, values: &[i32]) -> Result<Value, Fault> {
        self.arrays
            .allocate_from(values)
            .map(Value::Array)
            .map_err(|err| Fault::at(err, "<host>", 0))
    }

    /// Release every host array. Handles returned by
    /// [`alloc_array`](Self::alloc_array) must not be used afterwards.
    pub fn reset_arrays(&mut self) {
        self.arrays.truncate(0);
    }

    /// Contents of a host array.
    pub fn array(&self, value: Value) -> Option<&[i32]> {
        value.as_array().and_then(|r| self.arrays.get(r))
    }

    pub fn arrays(&self) -> &ArrayStore {
        &self.arrays
    }

    /// Invoke `entry` with `args` and run until it returns or faults.
    ///
    /// The entry method is identified by its name and `args.len()`. A method
    /// that returns no value yields `0`. Arrays the run allocates are
    /// released when it ends; host arrays are left in place.
    pub fn run(&mut self, entry: &str, args: &[Value]) -> Result<i32, Fault> {
        self.calls.clear();
        self.stats = RunStats::default();
        let host_arrays = self.arrays.len();

        let id = u8::try_from(args.len())
            .ok()
            .and_then(|arity| self.table.lookup(entry, arity))
            .ok_or_else(|| {
                self.fail(Fault::at(
                    ExecError::UnknownMethod {
                        name: entry.to_string(),
                        arity: args.len(),
                    },
                    entry,
                    0,
                ))
            })?;

        let method = self.table.method(id);
        self.calls
            .enter(id, method.slot_count(), args)
            .map_err(|err| self.fail(Fault::at(err, entry, 0)))?;

        debug!("run {}/{} args={:?}", entry, args.len(), args);
        self.state = RunState::Running;

        let outcome = self.execute();
        self.stats.max_depth = self.calls.high_water();
        self.stats.arrays = self.arrays.len() - host_arrays;
        self.arrays.truncate(host_arrays);

        match outcome {
            Ok(value) => {
                self.state = RunState::Halted;
                debug!(
                    "run {entry} halted with {value} after {} instruction(s)",
                    self.stats.instructions
                );
                Ok(value)
            }
            Err(fault) => Err(self.fail(fault)),
        }
    }

    fn fail(&mut self, fault: Fault) -> Fault {
        self.state = RunState::Faulted;
        warn!("{fault}");
        fault
    }

    fn execute(&mut self) -> Result<i32, Fault> {
        let table = self.table;
        loop {
            let frame = self.calls.current();
            let method = table.method(frame.method());
            let pc = frame.pc();

            if let Err(err) = self.check_limits() {
                return Err(Fault::at(err, method.name(), pc));
            }

            // The loader guarantees pc stays inside the body.
            let inst = &method.code()[pc];
            if self.config.trace.contains(TraceFlags::INSTRUCTIONS) && log_enabled!(Level::Trace) {
                trace!("{}@{pc:04} {inst} {:?}", method.name(), frame.stack());
            }
            self.stats.instructions += 1;

            match self.step(method, inst) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt(Value::Int(result))) => return Ok(result),
                Ok(Flow::Halt(other)) => {
                    let err = ExecError::TypeMismatch {
                        expected: "int",
                        found: other.type_name(),
                    };
                    return Err(Fault::at(err, method.name(), pc));
                }
                Err(err) => return Err(Fault::at(err, method.name(), pc)),
            }
        }
    }

    fn check_limits(&self) -> Result<(), ExecError> {
        if self.cancel.is_cancelled() {
            return Err(ExecError::Cancelled);
        }
        match self.config.instruction_budget {
            Some(budget) if self.stats.instructions >= budget => {
                Err(ExecError::BudgetExceeded(budget))
            }
            _ => Ok(()),
        }
    }

    /// Execute one instruction against the current frame.
    fn step(&mut self, method: &LoadedMethod, inst: &Instruction<MethodId>) -> Result<Flow, ExecError> {
        let frame = self.calls.current_mut();
        match inst {
            Instruction::Nop => {}
            Instruction::PushConst(v) => frame.push(Value::Int(*v)),
            Instruction::LoadConst(idx) => {
                frame.push(Value::Int(method.constants()[usize::from(*idx)]));
            }
            Instruction::LoadLocal(slot) => {
                let value = frame.load_local(*slot)?;
                frame.push(value);
            }
            Instruction::StoreLocal(slot) => {
                let value = frame.pop()?;
                frame.store_local(*slot, value)?;
            }

            Instruction::Add => binary(frame, |a, b| Ok(a.wrapping_add(b)))?,
            Instruction::Sub => binary(frame, |a, b| Ok(a.wrapping_sub(b)))?,
            Instruction::Mul => binary(frame, |a, b| Ok(a.wrapping_mul(b)))?,
            Instruction::Div => binary(frame, |a, b| {
                if b == 0 {
                    Err(ExecError::DivideByZero("division"))
                } else {
                    Ok(a.wrapping_div(b))
                }
            })?,
            Instruction::Mod => binary(frame, |a, b| {
                if b == 0 {
                    Err(ExecError::DivideByZero("modulo"))
                } else {
                    Ok(a.wrapping_rem(b))
                }
            })?,
            Instruction::Neg => {
                let a = frame.pop_int()?;
                frame.push(Value::Int(a.wrapping_neg()));
            }

            Instruction::CmpEq => {
                let b = frame.pop()?;
                let a = frame.pop()?;
                frame.push(Value::Int(i32::from(a == b)));
            }
            Instruction::CmpNe => {
                let b = frame.pop()?;
                let a = frame.pop()?;
                frame.push(Value::Int(i32::from(a != b)));
            }
            Instruction::CmpLt => binary(frame, |a, b| Ok(i32::from(a < b)))?,
            Instruction::CmpLe => binary(frame, |a, b| Ok(i32::from(a <= b)))?,
            Instruction::CmpGt => binary(frame, |a, b| Ok(i32::from(a > b)))?,
            Instruction::CmpGe => binary(frame, |a, b| Ok(i32::from(a >= b)))?,

            Instruction::Goto(target) => {
                frame.pc = *target;
                return Ok(Flow::Continue);
            }
            Instruction::IfFalse(target) => {
                if frame.pop_int()? == 0 {
                    frame.pc = *target;
                    return Ok(Flow::Continue);
                }
            }
            Instruction::IfTrue(target) => {
                if frame.pop_int()? != 0 {
                    frame.pc = *target;
                    return Ok(Flow::Continue);
                }
            }

            Instruction::NewArray(length) => {
                let array = self.arrays.allocate(*length)?;
                if self.config.trace.contains(TraceFlags::ARRAYS) {
                    trace!("{}: new {array} of length {length}", method.name());
                }
                frame.push(Value::Array(array));
            }
            Instruction::ArrayLoad => {
                let index = frame.pop_int()?;
                let array = frame.pop_array()?;
                let value = self.arrays.load(array, index)?;
                frame.push(Value::Int(value));
            }
            Instruction::ArrayStore => {
                let value = frame.pop_int()?;
                let index = frame.pop_int()?;
                let array = frame.pop_array()?;
                self.arrays.store(array, index, value)?;
                if self.config.trace.contains(TraceFlags::ARRAYS) {
                    trace!("{}: {array}[{index}] = {value}", method.name());
                }
            }
            Instruction::ArrayLength => {
                let array = frame.pop_array()?;
                let length = self.arrays.length(array)?;
                frame.push(Value::Int(length as i32));
            }

            Instruction::Invoke(callee) => {
                self.call(*callee)?;
                return Ok(Flow::Continue);
            }
            Instruction::Return => {
                let value = frame.pop()?;
                return Ok(self.return_from(method, Some(value)));
            }
            Instruction::ReturnVoid => return Ok(self.return_from(method, None)),
        }

        self.calls.current_mut().pc += 1;
        Ok(Flow::Continue)
    }

    fn call(&mut self, id: MethodId) -> Result<(), ExecError> {
        self.state = RunState::Calling;
        let callee = self.table.method(id);
        self.calls
            .push_call(id, callee.slot_count(), usize::from(callee.arity()))?;
        self.stats.calls += 1;
        if self.config.trace.contains(TraceFlags::CALLS) {
            trace!(
                "call {}/{} depth={} args={:?}",
                callee.name(),
                callee.arity(),
                self.calls.depth(),
                self.calls.current().locals()
            );
        }
        self.state = RunState::Running;
        Ok(())
    }

    fn return_from(&mut self, method: &LoadedMethod, value: Option<Value>) -> Flow {
        self.state = RunState::Returning;
        if self.config.trace.contains(TraceFlags::CALLS) {
            trace!(
                "return from {} depth={} value={:?}",
                method.name(),
                self.calls.depth(),
                value
            );
        }
        if self.calls.pop_frame() {
            return Flow::Halt(value.unwrap_or_default());
        }
        if let Some(value) = value {
            self.calls.current_mut().push(value);
        }
        self.state = RunState::Running;
        Flow::Continue
    }

    /// Active frames of the current or most recent run, outermost first.
    pub fn frames(&self) -> &[Frame] {
        self.calls.frames()
    }
}

/// Pop two integers (top is the right-hand operand) and push `op(lhs, rhs)`.
fn binary(
    frame: &mut Frame,
    op: impl FnOnce(i32, i32) -> Result<i32, ExecError>,
) -> Result<(), ExecError> {
    let rhs = frame.pop_int()?;
    let lhs = frame.pop_int()?;
    frame.push(Value::Int(op(lhs, rhs)?));
    Ok(())
}

/// Run `entry` on a fresh VM with the default configuration.
pub fn run(table: &MethodTable, entry: &str, args: &[Value]) -> Result<i32, Fault> {
    BaseplateVm::new(table).run(entry, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::fault::FaultKind;
    use pretty_assertions::assert_eq;

    fn table(source: &str) -> MethodTable {
        MethodTable::load(assemble(source).expect("assemble")).expect("load")
    }

    fn expect_fault(source: &str, entry: &str, args: &[Value]) -> Fault {
        let table = table(source);
        run(&table, entry, args).expect_err("run should fault")
    }

    #[test]
    fn evaluates_arithmetic_expression() {
        let t = table(
            "method main(0)
                push 5
                push 3
                push 2
                mul
                add
                return
            end",
        );
        let mut vm = BaseplateVm::new(&t);
        assert_eq!(vm.state(), RunState::Ready);
        assert_eq!(vm.run("main", &[]), Ok(11));
        assert_eq!(vm.state(), RunState::Halted);
        assert_eq!(vm.stats().instructions, 6);
        assert_eq!(vm.stats().max_depth, 1);
    }

    #[test]
    fn arithmetic_wraps_on_overflow() {
        let t = table(
            "method add(2)
                load 0
                load 1
                add
                return
            end
            method mul(2)
                load 0
                load 1
                mul
                return
            end
            method div(2)
                load 0
                load 1
                div
                return
            end
            method neg(1)
                load 0
                neg
                return
            end",
        );
        let args = |a: i32, b: i32| [Value::Int(a), Value::Int(b)];
        assert_eq!(run(&t, "add", &args(i32::MAX, 1)), Ok(i32::MIN));
        assert_eq!(run(&t, "add", &args(1, i32::MAX)), Ok(i32::MIN));
        assert_eq!(run(&t, "mul", &args(i32::MAX, 2)), Ok(-2));
        assert_eq!(run(&t, "mul", &args(2, i32::MAX)), Ok(-2));
        assert_eq!(run(&t, "div", &args(i32::MIN, -1)), Ok(i32::MIN));
        assert_eq!(run(&t, "div", &args(-7, 2)), Ok(-3));
        assert_eq!(run(&t, "neg", &[Value::Int(i32::MIN)]), Ok(i32::MIN));
    }

    #[test]
    fn remainder_follows_dividend_sign() {
        let t = table(
            "method rem(2)
                load 0
                load 1
                mod
                return
            end",
        );
        assert_eq!(run(&t, "rem", &[Value::Int(-7), Value::Int(3)]), Ok(-1));
        assert_eq!(run(&t, "rem", &[Value::Int(7), Value::Int(-3)]), Ok(1));
        assert_eq!(run(&t, "rem", &[Value::Int(i32::MIN), Value::Int(-1)]), Ok(0));
    }

    #[test]
    fn division_by_zero_faults() {
        let fault = expect_fault(
            "method main(0)
                push 10
                push 0
                div
                return
            end",
            "main",
            &[],
        );
        assert_eq!(fault.kind, FaultKind::ArithmeticError);
        assert_eq!(fault.method, "main");
        assert_eq!(fault.index, 2);

        let fault = expect_fault(
            "method main(0)
                push 10
                push 0
                mod
                return
            end",
            "main",
            &[],
        );
        assert_eq!(fault.kind, FaultKind::ArithmeticError);
    }

    #[test]
    fn comparisons_push_canonical_booleans() {
        let t = table(
            "method lt(2)
                load 0
                load 1
                cmp_lt
                return
            end
            method ge(2)
                load 0
                load 1
                cmp_ge
                return
            end
            method ne(2)
                load 0
                load 1
                cmp_ne
                return
            end",
        );
        let args = |a: i32, b: i32| [Value::Int(a), Value::Int(b)];
        assert_eq!(run(&t, "lt", &args(-1, 0)), Ok(1));
        assert_eq!(run(&t, "lt", &args(3, 3)), Ok(0));
        assert_eq!(run(&t, "ge", &args(3, 3)), Ok(1));
        assert_eq!(run(&t, "ne", &args(4, 5)), Ok(1));
    }

    #[test]
    fn arrays_compare_by_identity() {
        let t = table(
            "method same(2)
                load 0
                load 1
                cmp_eq
                return
            end",
        );
        let mut vm = BaseplateVm::new(&t);
        let a = vm.alloc_array(&[1, 2]).unwrap();
        let b = vm.alloc_array(&[1, 2]).unwrap();
        assert_eq!(vm.run("same", &[a, a]), Ok(1));
        assert_eq!(vm.run("same", &[a, b]), Ok(0));
    }

    #[test]
    fn operand_underflow_faults() {
        let ops = [
            "add", "sub", "mul", "div", "mod", "neg", "cmp_eq", "cmp_ne", "cmp_lt", "cmp_le",
            "cmp_gt", "cmp_ge", "store 0", "if_false 0", "if_true 0", "array_load",
            "array_store", "array_length", "return",
        ];
        for op in ops {
            let source = format!("method main(0) locals 1\n {op}\n return_void\nend");
            let fault = expect_fault(&source, "main", &[]);
            assert_eq!(fault.kind, FaultKind::StackUnderflow, "{op}");
            assert_eq!(fault.index, 0);
        }
    }

    #[test]
    fn missing_call_arguments_underflow() {
        let fault = expect_fault(
            "method main(0)
                push 1
                invoke pair 2
                return
            end
            method pair(2)
                load 0
                return
            end",
            "main",
            &[],
        );
        assert_eq!(fault.kind, FaultKind::StackUnderflow);
        assert_eq!(fault.method, "main");
        assert_eq!(fault.index, 1);
    }

    #[test]
    fn slot_outside_frame_faults() {
        let fault = expect_fault(
            "method main(0) locals 2
                load 2
                return
            end",
            "main",
            &[],
        );
        assert_eq!(fault.kind, FaultKind::InvalidSlot);
    }

    #[test]
    fn array_access_is_bounds_checked() {
        let source = "method at(1)
                new_array 3
                load 0
                array_load
                return
            end";
        let t = table(source);
        assert_eq!(run(&t, "at", &[Value::Int(2)]), Ok(0));
        for index in [-1, 3] {
            let fault = run(&t, "at", &[Value::Int(index)]).unwrap_err();
            assert_eq!(fault.kind, FaultKind::IndexOutOfBounds);
            assert_eq!(fault.index, 2);
        }
    }

    #[test]
    fn negative_array_length_faults() {
        let fault = expect_fault(
            "method main(0)
                new_array -1
                array_length
                return
            end",
            "main",
            &[],
        );
        assert_eq!(fault.kind, FaultKind::InvalidLength);

        let t = table(
            "method main(0)
                new_array 0
                array_length
                return
            end",
        );
        assert_eq!(run(&t, "main", &[]), Ok(0));
    }

    #[test]
    fn array_length_limit_comes_from_config() {
        let t = table(
            "method main(0)
                new_array 100
                array_length
                return
            end",
        );
        let mut vm = BaseplateVm::with_config(&t, VmConfig::default().with_max_array_length(10));
        assert_eq!(vm.run("main", &[]).unwrap_err().kind, FaultKind::InvalidLength);
    }

    #[test]
    fn array_operands_must_be_arrays() {
        let fault = expect_fault(
            "method main(0)
                push 4
                array_length
                return
            end",
            "main",
            &[],
        );
        assert_eq!(fault.kind, FaultKind::TypeMismatch);

        let fault = expect_fault(
            "method main(0)
                new_array 1
                push 1
                add
                return
            end",
            "main",
            &[],
        );
        assert_eq!(fault.kind, FaultKind::TypeMismatch);
    }

    #[test]
    fn unbounded_recursion_overflows() {
        let t = table(
            "method down(1)
                load 0
                push 1
                add
                invoke down 1
                return
            end",
        );
        let mut vm = BaseplateVm::with_config(&t, VmConfig::default().with_max_call_depth(16));
        let fault = vm.run("down", &[Value::Int(0)]).unwrap_err();
        assert_eq!(fault.kind, FaultKind::StackOverflow);
        assert_eq!(fault.index, 3);
        assert_eq!(vm.state(), RunState::Faulted);
        assert_eq!(vm.stats().max_depth, 16);
        assert_eq!(vm.stats().calls, 15);
    }

    #[test]
    fn callee_results_return_to_caller() {
        let t = table(
            "method main(0)
                push 7
                push 9
                invoke sub 2
                push 100
                add
                return
            end
            method sub(2)
                load 0
                load 1
                sub
                return
            end",
        );
        let mut vm = BaseplateVm::new(&t);
        assert_eq!(vm.run("main", &[]), Ok(98));
        assert_eq!(vm.stats().calls, 1);
        assert_eq!(vm.stats().max_depth, 2);
    }

    #[test]
    fn void_methods_push_nothing() {
        let t = table(
            "method main(0)
                push 5
                invoke touch 0
                return
            end
            method touch(0)
                return_void
            end",
        );
        assert_eq!(run(&t, "main", &[]), Ok(5));
        assert_eq!(run(&t, "touch", &[]), Ok(0));
    }

    #[test]
    fn constants_and_if_true() {
        let t = table(
            "method pick(1)
                const 0x7f
                const -300
                load 0
                if_true second
                ldc 0
                return
            second:
                ldc 1
                return
            end",
        );
        assert_eq!(run(&t, "pick", &[Value::Int(0)]), Ok(127));
        assert_eq!(run(&t, "pick", &[Value::Int(-2)]), Ok(-300));
    }

    #[test]
    fn nop_only_advances() {
        let t = table("method main(0)\n nop\n nop\n push 3\n return\nend");
        let mut vm = BaseplateVm::new(&t);
        assert_eq!(vm.run("main", &[]), Ok(3));
        assert_eq!(vm.stats().instructions, 4);
    }

    #[test]
    fn unknown_entry_is_reported() {
        let t = table("method main(0)\n push 1\n return\nend");
        let fault = run(&t, "main", &[Value::Int(1)]).unwrap_err();
        assert_eq!(fault.kind, FaultKind::UnknownMethod);
        assert_eq!(fault.method, "main");

        let mut vm = BaseplateVm::new(&t);
        assert_eq!(vm.run("missing", &[]).unwrap_err().kind, FaultKind::UnknownMethod);
        assert_eq!(vm.state(), RunState::Faulted);
    }

    #[test]
    fn array_results_are_rejected_at_the_entry() {
        let fault = expect_fault(
            "method main(0)
                new_array 2
                return
            end",
            "main",
            &[],
        );
        assert_eq!(fault.kind, FaultKind::TypeMismatch);
        assert_eq!(fault.index, 1);
    }

    #[test]
    fn instruction_budget_stops_loops() {
        let t = table("method spin(0)\ntop:\n goto top\nend");
        let mut vm = BaseplateVm::with_config(&t, VmConfig::default().with_instruction_budget(50));
        let fault = vm.run("spin", &[]).unwrap_err();
        assert_eq!(fault.kind, FaultKind::BudgetExceeded);
        assert_eq!(vm.stats().instructions, 50);
    }

    #[test]
    fn cancelled_runs_stop_immediately() {
        let t = table("method main(0)\n push 1\n return\nend");
        let mut vm = BaseplateVm::new(&t);
        let handle = vm.cancel_handle();
        handle.cancel();
        assert!(handle.is_cancelled());
        let fault = vm.run("main", &[]).unwrap_err();
        assert_eq!(fault.kind, FaultKind::Cancelled);
        assert_eq!(vm.stats().instructions, 0);
    }

    #[test]
    fn fresh_vms_are_deterministic() {
        let t = table(
            "method sum(1) locals 2
            top:
                load 0
                if_false done
                load 1
                load 0
                add
                store 1
                load 0
                push 1
                sub
                store 0
                goto top
            done:
                load 1
                return
            end",
        );
        let results: Vec<_> = (0..3)
            .map(|_| {
                let mut vm = BaseplateVm::new(&t);
                let value = vm.run("sum", &[Value::Int(100)]);
                (value, vm.stats())
            })
            .collect();
        assert_eq!(results[0].0, Ok(5050));
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
    }

    #[test]
    fn host_arrays_are_visible_after_the_run() {
        let t = table(
            "method fill(2)
                load 0
                push 0
                load 1
                array_store
                return_void
            end",
        );
        let mut vm = BaseplateVm::new(&t);
        let arr = vm.alloc_array(&[0, 0]).unwrap();
        assert_eq!(vm.run("fill", &[arr, Value::Int(9)]), Ok(0));
        assert_eq!(vm.array(arr), Some(&[9, 0][..]));
        assert_eq!(vm.stats().arrays, 0);
        assert_eq!(vm.arrays().len(), 1);
        assert_eq!(vm.array(Value::Int(1)), None);

        vm.reset_arrays();
        assert_eq!(vm.array(arr), None);
        assert!(vm.arrays().is_empty());
    }

    #[test]
    fn run_arrays_are_released_between_runs() {
        let t = table(
            "method scratch(1) locals 2
                new_array 4
                store 1
                load 1
                push 3
                load 0
                array_store
                load 1
                push 3
                array_load
                return
            end",
        );
        let mut vm = BaseplateVm::new(&t);
        let host = vm.alloc_array(&[7]).unwrap();
        for n in 0..1000 {
            assert_eq!(vm.run("scratch", &[Value::Int(n)]), Ok(n));
            assert_eq!(vm.stats().arrays, 1);
            assert_eq!(vm.arrays().len(), 1);
            assert_eq!(vm.arrays().elements(), 1);
        }
        assert_eq!(vm.array(host), Some(&[7][..]));

        let t = table("method bad(0)\n new_array 2\n push 5\n array_load\n return\nend");
        let mut vm = BaseplateVm::new(&t);
        assert_eq!(vm.run("bad", &[]).unwrap_err().kind, FaultKind::IndexOutOfBounds);
        assert_eq!(vm.stats().arrays, 1);
        assert!(vm.arrays().is_empty());
    }

    #[test]
    fn heap_limit_faults_instead_of_growing() {
        let t = table(
            "method hog(0) locals 1
            top:
                new_array 1048576
                store 0
                goto top
            end
            method once(0)
                new_array 600
                array_length
                return
            end",
        );
        let config = VmConfig::default().with_max_heap_elements(1 << 21);
        let mut vm = BaseplateVm::with_config(&t, config);
        let fault = vm.run("hog", &[]).unwrap_err();
        assert_eq!(fault.kind, FaultKind::InvalidLength);
        assert_eq!(fault.index, 0);
        assert_eq!(vm.stats().arrays, 2);
        assert_eq!(vm.arrays().elements(), 0);

        let mut vm = BaseplateVm::with_config(&t, VmConfig::default().with_max_heap_elements(1000));
        assert_eq!(vm.run("once", &[]), Ok(600));
        assert_eq!(vm.run("once", &[]), Ok(600));
        vm.alloc_array(&[0; 500]).unwrap();
        assert_eq!(vm.run("once", &[]).unwrap_err().kind, FaultKind::InvalidLength);
        assert_eq!(vm.alloc_array(&[0; 501]).unwrap_err().kind, FaultKind::InvalidLength);
    }

    #[test]
    fn cancellation_can_be_cleared() {
        let t = table("method main(0)\n push 1\n return\nend");
        let mut vm = BaseplateVm::new(&t);
        let handle = vm.cancel_handle();
        handle.cancel();
        assert_eq!(vm.run("main", &[]).unwrap_err().kind, FaultKind::Cancelled);
        assert_eq!(vm.run("main", &[]).unwrap_err().kind, FaultKind::Cancelled);
        handle.reset();
        assert!(!vm.cancel_handle().is_cancelled());
        assert_eq!(vm.run("main", &[]), Ok(1));
    }
}
