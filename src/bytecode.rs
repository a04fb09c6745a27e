// src/bytecode.rs
// Instruction set and method representation handed to the loader

use std::fmt;

#[cfg(feature = "serde-program")]
use serde::{Deserialize, Serialize};

/// Unresolved reference to a static method, identified by name and argument count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-program", derive(Serialize, Deserialize))]
pub struct CallTarget {
    pub name: String,
    pub argc: u8,
}

impl CallTarget {
    pub fn new(name: impl Into<String>, argc: u8) -> Self {
        Self {
            name: name.into(),
            argc,
        }
    }
}

impl fmt::Display for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.argc)
    }
}

/// One instruction of a method body.
///
/// `C` is the call operand: producers build methods with [`CallTarget`]s,
/// and loading lowers them to dense [`MethodId`](crate::table::MethodId)s.
/// Branch operands are absolute instruction indices.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-program",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Instruction<C = CallTarget> {
    Nop,
    PushConst(i32),
    /// Push an entry of the method's constant pool.
    LoadConst(u16),
    LoadLocal(u16),
    StoreLocal(u16),

    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,

    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,

    Goto(usize),
    IfFalse(usize),
    IfTrue(usize),

    NewArray(i32),
    ArrayLoad,
    ArrayStore,
    ArrayLength,

    Invoke(C),
    Return,
    ReturnVoid,
}

impl<C> Instruction<C> {
    /// Assembler mnemonic for this opcode.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Nop => "nop",
            Instruction::PushConst(_) => "push",
            Instruction::LoadConst(_) => "ldc",
            Instruction::LoadLocal(_) => "load",
            Instruction::StoreLocal(_) => "store",
            Instruction::Add => "add",
            Instruction::Sub => "sub",
            Instruction::Mul => "mul",
            Instruction::Div => "div",
            Instruction::Mod => "mod",
            Instruction::Neg => "neg",
            Instruction::CmpEq => "cmp_eq",
            Instruction::CmpNe => "cmp_ne",
            Instruction::CmpLt => "cmp_lt",
            Instruction::CmpLe => "cmp_le",
            Instruction::CmpGt => "cmp_gt",
            Instruction::CmpGe => "cmp_ge",
            Instruction::Goto(_) => "goto",
            Instruction::IfFalse(_) => "if_false",
            Instruction::IfTrue(_) => "if_true",
            Instruction::NewArray(_) => "new_array",
            Instruction::ArrayLoad => "array_load",
            Instruction::ArrayStore => "array_store",
            Instruction::ArrayLength => "array_length",
            Instruction::Invoke(_) => "invoke",
            Instruction::Return => "return",
            Instruction::ReturnVoid => "return_void",
        }
    }

    /// Branch destination, if this instruction can transfer control within the method.
    pub fn branch_target(&self) -> Option<usize> {
        match self {
            Instruction::Goto(t) | Instruction::IfFalse(t) | Instruction::IfTrue(t) => Some(*t),
            _ => None,
        }
    }

    /// True when control never continues to the next instruction.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Goto(_) | Instruction::Return | Instruction::ReturnVoid
        )
    }

    /// Rewrite the call operand, keeping every other instruction as-is.
    pub fn map_call<D, E>(self, f: impl FnOnce(C) -> Result<D, E>) -> Result<Instruction<D>, E> {
        Ok(match self {
            Instruction::Nop => Instruction::Nop,
            Instruction::PushConst(v) => Instruction::PushConst(v),
            Instruction::LoadConst(i) => Instruction::LoadConst(i),
            Instruction::LoadLocal(s) => Instruction::LoadLocal(s),
            Instruction::StoreLocal(s) => Instruction::StoreLocal(s),
            Instruction::Add => Instruction::Add,
            Instruction::Sub => Instruction::Sub,
            Instruction::Mul => Instruction::Mul,
            Instruction::Div => Instruction::Div,
            Instruction::Mod => Instruction::Mod,
            Instruction::Neg => Instruction::Neg,
            Instruction::CmpEq => Instruction::CmpEq,
            Instruction::CmpNe => Instruction::CmpNe,
            Instruction::CmpLt => Instruction::CmpLt,
            Instruction::CmpLe => Instruction::CmpLe,
            Instruction::CmpGt => Instruction::CmpGt,
            Instruction::CmpGe => Instruction::CmpGe,
            Instruction::Goto(t) => Instruction::Goto(t),
            Instruction::IfFalse(t) => Instruction::IfFalse(t),
            Instruction::IfTrue(t) => Instruction::IfTrue(t),
            Instruction::NewArray(n) => Instruction::NewArray(n),
            Instruction::ArrayLoad => Instruction::ArrayLoad,
            Instruction::ArrayStore => Instruction::ArrayStore,
            Instruction::ArrayLength => Instruction::ArrayLength,
            Instruction::Invoke(c) => Instruction::Invoke(f(c)?),
            Instruction::Return => Instruction::Return,
            Instruction::ReturnVoid => Instruction::ReturnVoid,
        })
    }
}

impl<C: fmt::Display> fmt::Display for Instruction<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.mnemonic();
        match self {
            Instruction::PushConst(v) | Instruction::NewArray(v) => write!(f, "{op} {v}"),
            Instruction::LoadConst(i) | Instruction::LoadLocal(i) | Instruction::StoreLocal(i) => {
                write!(f, "{op} {i}")
            }
            Instruction::Goto(t) | Instruction::IfFalse(t) | Instruction::IfTrue(t) => {
                write!(f, "{op} {t}")
            }
            Instruction::Invoke(c) => write!(f, "{op} {c}"),
            _ => f.write_str(op),
        }
    }
}

/// A static method as supplied by a bytecode producer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-program", derive(Serialize, Deserialize))]
pub struct Method {
    pub name: String,
    /// Number of parameters, bound to locals `0..arity`.
    pub arity: u8,
    /// Number of local variable slots, parameters included.
    pub slot_count: u16,
    /// Literal pool addressed by `LoadConst`.
    #[cfg_attr(feature = "serde-program", serde(default))]
    pub constants: Vec<i32>,
    pub code: Vec<Instruction>,
}

impl Method {
    pub fn new(name: impl Into<String>, arity: u8, slot_count: u16, code: Vec<Instruction>) -> Self {
        Self {
            name: name.into(),
            arity,
            slot_count,
            constants: Vec::new(),
            code,
        }
    }

    pub fn with_constants(mut self, constants: Vec<i32>) -> Self {
        self.constants = constants;
        self
    }

    /// Listing of the body, one instruction per line.
    pub fn listing(&self) -> String {
        let mut out = format!("method {}({}) locals {}\n", self.name, self.arity, self.slot_count);
        for value in &self.constants {
            out.push_str(&format!("    const {value}\n"));
        }
        for (pc, inst) in self.code.iter().enumerate() {
            out.push_str(&format!("{pc:04}    {inst}\n"));
        }
        out.push_str("end\n");
        out
    }
}
