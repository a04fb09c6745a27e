//! Static checks run once per method at load time.
//!
//! The interpreter loop trusts what passes here: every branch lands inside
//! the body, every constant-pool index exists, and no reachable path can run
//! off the end of the code. Checks that depend on the other methods of the
//! program (call resolution) live in [`crate::table`].

use bitvec::prelude::*;
use log::debug;

use crate::bytecode::{Instruction, Method};
use crate::fault::LoadError;

/// Verify the shape of a single method body.
pub fn verify_method(method: &Method) -> Result<(), LoadError> {
    let name = method.name.as_str();
    let len = method.code.len();

    if len == 0 {
        return Err(LoadError::program(name, 0, "empty method body"));
    }
    if u16::from(method.arity) > method.slot_count {
        return Err(LoadError::program(
            name,
            0,
            format!(
                "{} parameter(s) do not fit in {} local slot(s)",
                method.arity, method.slot_count
            ),
        ));
    }

    for (pc, inst) in method.code.iter().enumerate() {
        if let Some(target) = inst.branch_target() {
            if target >= len {
                return Err(LoadError::program(
                    name,
                    pc,
                    format!("branch target {target} outside 0..{len}"),
                ));
            }
        }
        if let Instruction::LoadConst(idx) = inst {
            if usize::from(*idx) >= method.constants.len() {
                return Err(LoadError::program(
                    name,
                    pc,
                    format!(
                        "constant index {idx} outside pool of {}",
                        method.constants.len()
                    ),
                ));
            }
        }
    }

    let reachable = reachable_instructions(&method.code);
    let last = len - 1;
    if reachable[last] && !method.code[last].is_terminator() {
        return Err(LoadError::program(
            name,
            last,
            "control falls off the end of the method",
        ));
    }

    let dead = reachable.count_zeros();
    if dead > 0 {
        debug!("method `{name}`: {dead} unreachable instruction(s)");
    }
    Ok(())
}

/// Mark every instruction reachable from index 0. Targets must already be in range.
fn reachable_instructions<C>(code: &[Instruction<C>]) -> BitVec {
    let mut seen = bitvec![0; code.len()];
    let mut work = vec![0usize];

    while let Some(pc) = work.pop() {
        if pc >= code.len() || seen[pc] {
            continue;
        }
        seen.set(pc, true);

        let inst = &code[pc];
        if let Some(target) = inst.branch_target() {
            work.push(target);
        }
        if !inst.is_terminator() {
            work.push(pc + 1);
        }
    }
    seen
}
