use std::collections::HashMap;

use thiserror::Error;

use crate::bytecode::{CallTarget, Instruction, Method};

/// Errors produced while assembling method source.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AsmError {
    #[error("line {line}: unknown instruction `{token}`")]
    UnknownInstruction { line: usize, token: String },
    #[error("line {line}: `{instruction}` needs an operand")]
    MissingOperand { line: usize, instruction: String },
    #[error("line {line}: `{instruction}` takes no further operand")]
    UnexpectedOperand { line: usize, instruction: String },
    #[error("line {line}: invalid number `{operand}`")]
    InvalidNumber { line: usize, operand: String },
    #[error("line {line}: label `{name}` not found")]
    LabelNotFound { line: usize, name: String },
    #[error("line {line}: duplicate label `{name}`")]
    DuplicateLabel { line: usize, name: String },
    #[error("line {line}: malformed method header")]
    InvalidHeader { line: usize },
    #[error("line {line}: instruction outside of a method")]
    OutsideMethod { line: usize },
    #[error("method `{name}` is missing `end`")]
    UnterminatedMethod { name: String },
}

enum Target {
    Index(usize),
    Label(String),
}

/// Instruction whose branch operand may still name a label.
struct RawInstruction {
    inst: Instruction,
    target: Option<Target>,
    line: usize,
}

struct PendingMethod {
    name: String,
    arity: u8,
    slot_count: u16,
    constants: Vec<i32>,
    labels: HashMap<String, usize>,
    body: Vec<RawInstruction>,
}

/// Assemble source text into methods ready for [`MethodTable::load`](crate::table::MethodTable::load).
///
/// ```text
/// method gcd(2) locals 3      ; name(arity), local slot count
///     const 1000              ; constant pool entry, read with `ldc 0`
/// loop:
///     load 1
///     if_false done
///     invoke helper 2         ; callee name and argument count
///     goto loop
/// done:
///     load 0
///     return
/// end
/// ```
///
/// Labels are local to their method and become absolute instruction
/// indices. Calls stay symbolic until the method table resolves them.
pub fn assemble(source: &str) -> Result<Vec<Method>, AsmError> {
    let mut methods = Vec::new();
    let mut current: Option<PendingMethod> = None;

    for (line_idx, line) in source.lines().enumerate() {
        let line_no = line_idx + 1;
        let stripped = line.split(';').next().unwrap_or("").trim();
        if stripped.is_empty() {
            continue;
        }

        if let Some(header) = stripped.strip_prefix("method ") {
            if let Some(open) = current.take() {
                return Err(AsmError::UnterminatedMethod { name: open.name });
            }
            current = Some(parse_header(header, line_no)?);
            continue;
        }

        let Some(method) = current.as_mut() else {
            return Err(AsmError::OutsideMethod { line: line_no });
        };

        if stripped == "end" {
            if let Some(done) = current.take() {
                methods.push(finish(done)?);
            }
            continue;
        }

        let mut working = stripped;
        while let Some(colon) = working.find(':') {
            let label = working[..colon].trim();
            if !label.is_empty() {
                if method.labels.contains_key(label) {
                    return Err(AsmError::DuplicateLabel {
                        line: line_no,
                        name: label.to_string(),
                    });
                }
                method.labels.insert(label.to_string(), method.body.len());
            }
            working = working[colon + 1..].trim();
        }
        if working.is_empty() {
            continue;
        }

        let mut parts = working.split_whitespace();
        let op = parts.next().unwrap_or_default();
        let operands: Vec<&str> = parts.collect();

        if op.eq_ignore_ascii_case("const") {
            let value = single_operand(op, &operands, line_no)?;
            method.constants.push(parse_number(value, line_no)?);
            continue;
        }

        method.body.push(parse_instruction(op, &operands, line_no)?);
    }

    match current {
        Some(open) => Err(AsmError::UnterminatedMethod { name: open.name }),
        None => Ok(methods),
    }
}

/// Parse `name(arity) [locals n]`.
fn parse_header(header: &str, line: usize) -> Result<PendingMethod, AsmError> {
    let bad = || AsmError::InvalidHeader { line };
    let open = header.find('(').ok_or_else(bad)?;
    let close = header.find(')').filter(|&c| c > open).ok_or_else(bad)?;

    let name = header[..open].trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(bad());
    }
    let arity: u8 = header[open + 1..close].trim().parse().map_err(|_| bad())?;

    let rest: Vec<&str> = header[close + 1..].split_whitespace().collect();
    let slot_count = match rest.as_slice() {
        [] => u16::from(arity),
        ["locals", n] => n.parse().map_err(|_| bad())?,
        _ => return Err(bad()),
    };

    Ok(PendingMethod {
        name: name.to_string(),
        arity,
        slot_count,
        constants: Vec::new(),
        labels: HashMap::new(),
        body: Vec::new(),
    })
}

fn parse_instruction(op: &str, operands: &[&str], line: usize) -> Result<RawInstruction, AsmError> {
    let name = op.to_lowercase();
    let simple = |inst: Instruction| -> Result<RawInstruction, AsmError> {
        if !operands.is_empty() {
            return Err(AsmError::UnexpectedOperand {
                line,
                instruction: name.clone(),
            });
        }
        Ok(RawInstruction {
            inst,
            target: None,
            line,
        })
    };
    let with_value = |make: fn(i32) -> Instruction| -> Result<RawInstruction, AsmError> {
        let text = single_operand(&name, operands, line)?;
        Ok(RawInstruction {
            inst: make(parse_number(text, line)?),
            target: None,
            line,
        })
    };
    let with_index = |make: fn(u16) -> Instruction| -> Result<RawInstruction, AsmError> {
        let text = single_operand(&name, operands, line)?;
        let value = parse_number(text, line)?;
        let index = u16::try_from(value).map_err(|_| AsmError::InvalidNumber {
            line,
            operand: text.to_string(),
        })?;
        Ok(RawInstruction {
            inst: make(index),
            target: None,
            line,
        })
    };
    let with_target = |make: fn(usize) -> Instruction| -> Result<RawInstruction, AsmError> {
        let text = single_operand(&name, operands, line)?;
        let numeric = text.starts_with(|c: char| c.is_ascii_digit() || c == '-');
        let target = if numeric {
            let value = parse_number(text, line)?;
            Target::Index(usize::try_from(value).map_err(|_| AsmError::InvalidNumber {
                line,
                operand: text.to_string(),
            })?)
        } else {
            Target::Label(text.to_string())
        };
        Ok(RawInstruction {
            inst: make(0),
            target: Some(target),
            line,
        })
    };

    match name.as_str() {
        "nop" => simple(Instruction::Nop),
        "push" => with_value(Instruction::PushConst),
        "ldc" => with_index(Instruction::LoadConst),
        "load" => with_index(Instruction::LoadLocal),
        "store" => with_index(Instruction::StoreLocal),
        "add" => simple(Instruction::Add),
        "sub" => simple(Instruction::Sub),
        "mul" => simple(Instruction::Mul),
        "div" => simple(Instruction::Div),
        "mod" => simple(Instruction::Mod),
        "neg" => simple(Instruction::Neg),
        "cmp_eq" => simple(Instruction::CmpEq),
        "cmp_ne" => simple(Instruction::CmpNe),
        "cmp_lt" => simple(Instruction::CmpLt),
        "cmp_le" => simple(Instruction::CmpLe),
        "cmp_gt" => simple(Instruction::CmpGt),
        "cmp_ge" => simple(Instruction::CmpGe),
        "goto" => with_target(Instruction::Goto),
        "if_false" => with_target(Instruction::IfFalse),
        "if_true" => with_target(Instruction::IfTrue),
        "new_array" => with_value(Instruction::NewArray),
        "array_load" => simple(Instruction::ArrayLoad),
        "array_store" => simple(Instruction::ArrayStore),
        "array_length" => simple(Instruction::ArrayLength),
        "return" => simple(Instruction::Return),
        "return_void" => simple(Instruction::ReturnVoid),
        "invoke" => match operands {
            [callee, argc] => {
                let argc = parse_number(argc, line)?;
                let argc = u8::try_from(argc).map_err(|_| AsmError::InvalidNumber {
                    line,
                    operand: argc.to_string(),
                })?;
                Ok(RawInstruction {
                    inst: Instruction::Invoke(CallTarget::new(*callee, argc)),
                    target: None,
                    line,
                })
            }
            [] | [_] => Err(AsmError::MissingOperand {
                line,
                instruction: name.clone(),
            }),
            _ => Err(AsmError::UnexpectedOperand {
                line,
                instruction: name.clone(),
            }),
        },
        _ => Err(AsmError::UnknownInstruction {
            line,
            token: op.to_string(),
        }),
    }
}

fn single_operand<'a>(instruction: &str, operands: &[&'a str], line: usize) -> Result<&'a str, AsmError> {
    match operands {
        [one] => Ok(*one),
        [] => Err(AsmError::MissingOperand {
            line,
            instruction: instruction.to_string(),
        }),
        _ => Err(AsmError::UnexpectedOperand {
            line,
            instruction: instruction.to_string(),
        }),
    }
}

/// Resolve label operands and produce the final method.
fn finish(pending: PendingMethod) -> Result<Method, AsmError> {
    let PendingMethod {
        name,
        arity,
        slot_count,
        constants,
        labels,
        body,
    } = pending;

    let mut code = Vec::with_capacity(body.len());
    for raw in body {
        let inst = match raw.target {
            None => raw.inst,
            Some(target) => {
                let index = match target {
                    Target::Index(i) => i,
                    Target::Label(label) => *labels.get(&label).ok_or(AsmError::LabelNotFound {
                        line: raw.line,
                        name: label,
                    })?,
                };
                retarget(raw.inst, index)
            }
        };
        code.push(inst);
    }

    Ok(Method::new(name, arity, slot_count, code).with_constants(constants))
}

fn retarget(inst: Instruction, index: usize) -> Instruction {
    match inst {
        Instruction::Goto(_) => Instruction::Goto(index),
        Instruction::IfFalse(_) => Instruction::IfFalse(index),
        Instruction::IfTrue(_) => Instruction::IfTrue(index),
        other => other,
    }
}

fn parse_number(token: &str, line: usize) -> Result<i32, AsmError> {
    let invalid = || AsmError::InvalidNumber {
        line,
        operand: token.to_string(),
    };
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    // Signs are only accepted once, ahead of any radix prefix.
    let magnitude = if let Some(hex) = digits.strip_prefix("0x") {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        i64::from_str_radix(hex, 16).map_err(|_| invalid())?
    } else {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        digits.parse::<i64>().map_err(|_| invalid())?
    };
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).map_err(|_| invalid())
}
