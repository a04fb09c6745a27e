// Copyright (C) 2025 Dayton Fishell
// Baseplate Bytecode Interpreter
// This file is part of Baseplate.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Baseplate: a small stack-based bytecode interpreter.
//!
//! Producers hand [`Method`]s (or assembler text, see [`asm`]) to
//! [`MethodTable::load`], which verifies them and resolves calls. A
//! [`BaseplateVm`] then runs entry methods over the table with integer
//! arithmetic, branches, heap arrays and static calls.

pub mod asm;
pub mod bytecode;
pub mod config;
pub mod core;
pub mod fault;
#[cfg(feature = "serde-program")]
pub mod interchange;
pub mod samples;
pub mod table;
pub mod value;
pub mod verify;
pub mod vm;

// Re-export commonly used types
pub use bytecode::{CallTarget, Instruction, Method};
pub use config::{TraceFlags, VmConfig};
pub use fault::{Fault, FaultKind, LoadError};
pub use table::{MethodId, MethodTable};
pub use value::{ArrayRef, Value};
pub use vm::{BaseplateVm, CancelHandle, RunState, RunStats, run};
