//! Interpreter for the pseudo-assembly emitted by the `asm` backend.
//!
//! The program text is parsed once into instructions with resolved jump
//! targets. Execution starts at `main:` with an empty value stack; `call`
//! pushes a return address onto the same stack, so stack offsets seen by a
//! function body count the return slot exactly as the generator modelled it.

use std::fmt;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

type VmResult<T> = std::result::Result<T, VmError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Unknown label '{label}'")]
    UnknownLabel { label: String },
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Stack offset {offset} is outside a stack of {len} values")]
    StackOutOfRange { offset: usize, len: usize },
    #[error("Register r{register} read before it was written")]
    UninitializedRegister { register: usize },
    #[error("'{operation}' cannot operate on {found}")]
    TypeMismatch {
        operation: &'static str,
        found: String,
    },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("'ret' found {found} instead of a return address")]
    BadReturn { found: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Integer(i64),
    Boolean(bool),
    String(String),
    Return(usize),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{value}"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::String(value) => f.write_str(value),
            Value::Return(address) => write!(f, "<return {address}>"),
        }
    }
}

impl Value {
    fn kind(&self) -> String {
        match self {
            Value::Integer(value) => format!("integer {value}"),
            Value::Boolean(value) => format!("boolean {value}"),
            Value::String(value) => format!("string {value:?}"),
            Value::Return(address) => format!("return address {address}"),
        }
    }

    fn as_int(&self, operation: &'static str) -> VmResult<i64> {
        match self {
            Value::Integer(value) => Ok(*value),
            other => Err(VmError::TypeMismatch {
                operation,
                found: other.kind(),
            }),
        }
    }

    fn as_bool(&self, operation: &'static str) -> VmResult<bool> {
        match self {
            Value::Boolean(value) => Ok(*value),
            other => Err(VmError::TypeMismatch {
                operation,
                found: other.kind(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
}

impl BinaryOp {
    fn parse(mnemonic: &str) -> Option<Self> {
        let op = match mnemonic {
            "add" => BinaryOp::Add,
            "sub" => BinaryOp::Sub,
            "mul" => BinaryOp::Mul,
            "div" => BinaryOp::Div,
            "and" => BinaryOp::And,
            "or" => BinaryOp::Or,
            "eq" => BinaryOp::Eq,
            "ne" => BinaryOp::Ne,
            "lt" => BinaryOp::Lt,
            "le" => BinaryOp::Le,
            "gt" => BinaryOp::Gt,
            "ge" => BinaryOp::Ge,
            "concat" => BinaryOp::Concat,
            _ => return None,
        };
        Some(op)
    }

    fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Lt => "lt",
            BinaryOp::Le => "le",
            BinaryOp::Gt => "gt",
            BinaryOp::Ge => "ge",
            BinaryOp::Concat => "concat",
        }
    }

    fn apply(self, lhs: &Value, rhs: &Value) -> VmResult<Value> {
        let op = self.mnemonic();
        let value = match self {
            BinaryOp::Add => Value::Integer(lhs.as_int(op)?.wrapping_add(rhs.as_int(op)?)),
            BinaryOp::Sub => Value::Integer(lhs.as_int(op)?.wrapping_sub(rhs.as_int(op)?)),
            BinaryOp::Mul => Value::Integer(lhs.as_int(op)?.wrapping_mul(rhs.as_int(op)?)),
            BinaryOp::Div => {
                let divisor = rhs.as_int(op)?;
                if divisor == 0 {
                    return Err(VmError::DivisionByZero);
                }
                Value::Integer(lhs.as_int(op)?.wrapping_div(divisor))
            }
            BinaryOp::And => Value::Boolean(lhs.as_bool(op)? && rhs.as_bool(op)?),
            BinaryOp::Or => Value::Boolean(lhs.as_bool(op)? || rhs.as_bool(op)?),
            BinaryOp::Eq => Value::Boolean(lhs == rhs),
            BinaryOp::Ne => Value::Boolean(lhs != rhs),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = match (lhs, rhs) {
                    (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
                    (Value::String(a), Value::String(b)) => a.cmp(b),
                    (other, _) => {
                        return Err(VmError::TypeMismatch {
                            operation: op,
                            found: other.kind(),
                        });
                    }
                };
                Value::Boolean(match self {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Le => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                })
            }
            BinaryOp::Concat => Value::String(format!("{lhs}{rhs}")),
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Instruction {
    Mov(usize, Value),
    Load(usize, usize),
    Store(usize, usize),
    Push(usize),
    Pop(usize),
    Drop(usize),
    Binary(BinaryOp, usize, usize, usize),
    Not(usize, usize),
    Neg(usize, usize),
    Jz(usize, usize),
    Jmp(usize),
    Call(usize),
    Ret,
    Halt,
    Out(usize),
    In(usize),
}

/// Instruction text before labels are resolved.
struct Pending<'a> {
    line: usize,
    mnemonic: &'a str,
    operands: Vec<&'a str>,
}

pub struct Vm {
    code: Vec<Instruction>,
    entry: usize,
    registers: Vec<Option<Value>>,
    stack: Vec<Value>,
    output: Vec<String>,
}

impl Vm {
    /// Parses program text and resolves every label.
    pub fn load(text: &str) -> VmResult<Self> {
        let mut labels = FxHashMap::default();
        let mut strings = FxHashMap::default();
        let mut pending = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let content = strip_comment(raw).trim();
            if content.is_empty() || content.starts_with('.') {
                continue;
            }
            if let Some((label, rest)) = content.split_once(':') {
                let rest = rest.trim();
                if let Some(literal) = rest.strip_prefix(".string") {
                    let literal = literal.trim();
                    let Some(inner) = literal
                        .strip_prefix('"')
                        .and_then(|literal| literal.strip_suffix('"'))
                    else {
                        return Err(VmError::Parse {
                            line,
                            message: format!("malformed string literal {literal}"),
                        });
                    };
                    strings.insert(label.trim().to_string(), unescape(inner));
                    continue;
                }
                if rest.is_empty() {
                    labels.insert(label.trim().to_string(), pending.len());
                    continue;
                }
            }
            let (mnemonic, operands) = content.split_once(' ').unwrap_or((content, ""));
            let operands = operands
                .split(',')
                .map(str::trim)
                .filter(|operand| !operand.is_empty())
                .collect();
            pending.push(Pending {
                line,
                mnemonic,
                operands,
            });
        }

        let code = pending
            .iter()
            .map(|instruction| resolve(instruction, &labels, &strings))
            .collect::<VmResult<Vec<_>>>()?;
        let entry = *labels.get("main").ok_or_else(|| VmError::UnknownLabel {
            label: "main".to_string(),
        })?;
        debug!(instructions = code.len(), labels = labels.len(), "loaded program");
        Ok(Self {
            code,
            entry,
            registers: Vec::new(),
            stack: Vec::new(),
            output: Vec::new(),
        })
    }

    /// Runs from `main`, reading `input` line by line, and returns the printed
    /// lines joined by newlines.
    pub fn run(&mut self, input: &str) -> VmResult<String> {
        self.registers.clear();
        self.stack.clear();
        self.output.clear();
        let mut input = input.lines();
        let mut pc = self.entry;

        while let Some(instruction) = self.code.get(pc).cloned() {
            pc += 1;
            match instruction {
                Instruction::Mov(dest, value) => self.write(dest, value),
                Instruction::Load(dest, offset) => {
                    let value = self.peek(offset)?.clone();
                    self.write(dest, value);
                }
                Instruction::Store(offset, src) => {
                    let value = self.read(src)?.clone();
                    *self.peek_mut(offset)? = value;
                }
                Instruction::Push(src) => {
                    let value = self.read(src)?.clone();
                    self.stack.push(value);
                }
                Instruction::Pop(dest) => {
                    let value = self.stack.pop().ok_or(VmError::StackUnderflow)?;
                    self.write(dest, value);
                }
                Instruction::Drop(count) => {
                    let len = self
                        .stack
                        .len()
                        .checked_sub(count)
                        .ok_or(VmError::StackUnderflow)?;
                    self.stack.truncate(len);
                }
                Instruction::Binary(op, dest, lhs, rhs) => {
                    let value = op.apply(self.read(lhs)?, self.read(rhs)?)?;
                    self.write(dest, value);
                }
                Instruction::Not(dest, src) => {
                    let value = !self.read(src)?.as_bool("not")?;
                    self.write(dest, Value::Boolean(value));
                }
                Instruction::Neg(dest, src) => {
                    let value = self.read(src)?.as_int("neg")?.wrapping_neg();
                    self.write(dest, Value::Integer(value));
                }
                Instruction::Jz(condition, target) => {
                    if !self.read(condition)?.as_bool("jz")? {
                        pc = target;
                    }
                }
                Instruction::Jmp(target) => pc = target,
                Instruction::Call(target) => {
                    self.stack.push(Value::Return(pc));
                    pc = target;
                }
                Instruction::Ret => match self.stack.pop() {
                    Some(Value::Return(address)) => pc = address,
                    Some(other) => return Err(VmError::BadReturn { found: other.kind() }),
                    None => return Err(VmError::StackUnderflow),
                },
                Instruction::Halt => break,
                Instruction::Out(src) => {
                    let text = self.read(src)?.to_string();
                    self.output.push(text);
                }
                Instruction::In(dest) => {
                    let line = input.next().unwrap_or_default().to_string();
                    self.write(dest, Value::String(line));
                }
            }
        }
        Ok(self.output.join("\n"))
    }

    fn read(&self, register: usize) -> VmResult<&Value> {
        self.registers
            .get(register)
            .and_then(Option::as_ref)
            .ok_or(VmError::UninitializedRegister { register })
    }

    fn write(&mut self, register: usize, value: Value) {
        if self.registers.len() <= register {
            self.registers.resize(register + 1, None);
        }
        self.registers[register] = Some(value);
    }

    fn slot(&self, offset: usize) -> VmResult<usize> {
        let len = self.stack.len();
        len.checked_sub(offset + 1)
            .ok_or(VmError::StackOutOfRange { offset, len })
    }

    fn peek(&self, offset: usize) -> VmResult<&Value> {
        let index = self.slot(offset)?;
        Ok(&self.stack[index])
    }

    fn peek_mut(&mut self, offset: usize) -> VmResult<&mut Value> {
        let index = self.slot(offset)?;
        Ok(&mut self.stack[index])
    }
}

fn resolve(
    pending: &Pending<'_>,
    labels: &FxHashMap<String, usize>,
    strings: &FxHashMap<String, String>,
) -> VmResult<Instruction> {
    let line = pending.line;
    let error = |message: String| VmError::Parse { line, message };
    let operand = |index: usize| {
        pending
            .operands
            .get(index)
            .copied()
            .ok_or_else(|| error(format!("'{}' is missing operand {}", pending.mnemonic, index + 1)))
    };
    let register = |index: usize| -> VmResult<usize> {
        let text = operand(index)?;
        text.strip_prefix('r')
            .and_then(|number| number.parse().ok())
            .ok_or_else(|| error(format!("expected a register, got '{text}'")))
    };
    let offset = |index: usize| -> VmResult<usize> {
        let text = operand(index)?;
        text.strip_prefix("[sp+")
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|number| number.parse().ok())
            .ok_or_else(|| error(format!("expected a stack operand, got '{text}'")))
    };
    let target = |index: usize| -> VmResult<usize> {
        let label = operand(index)?;
        labels
            .get(label)
            .copied()
            .ok_or_else(|| VmError::UnknownLabel {
                label: label.to_string(),
            })
    };

    let instruction = match pending.mnemonic {
        "mov" => {
            let text = operand(1)?;
            let value = match text {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                _ => Value::Integer(
                    text.parse()
                        .map_err(|_| error(format!("bad immediate '{text}'")))?,
                ),
            };
            Instruction::Mov(register(0)?, value)
        }
        "lea" => {
            let label = operand(1)?;
            let value = strings.get(label).ok_or_else(|| VmError::UnknownLabel {
                label: label.to_string(),
            })?;
            Instruction::Mov(register(0)?, Value::String(value.clone()))
        }
        "load" => Instruction::Load(register(0)?, offset(1)?),
        "store" => Instruction::Store(offset(0)?, register(1)?),
        "push" => Instruction::Push(register(0)?),
        "pop" => Instruction::Pop(register(0)?),
        "drop" => {
            let text = operand(0)?;
            Instruction::Drop(
                text.parse()
                    .map_err(|_| error(format!("bad count '{text}'")))?,
            )
        }
        "not" => Instruction::Not(register(0)?, register(1)?),
        "neg" => Instruction::Neg(register(0)?, register(1)?),
        "jz" => Instruction::Jz(register(0)?, target(1)?),
        "jmp" => Instruction::Jmp(target(0)?),
        "call" => Instruction::Call(target(0)?),
        "ret" => Instruction::Ret,
        "halt" => Instruction::Halt,
        "out.int" | "out.str" | "out.bool" => Instruction::Out(register(0)?),
        "in" => Instruction::In(register(0)?),
        mnemonic => match BinaryOp::parse(mnemonic) {
            Some(op) => Instruction::Binary(op, register(0)?, register(1)?, register(2)?),
            None => return Err(error(format!("unknown instruction '{mnemonic}'"))),
        },
    };
    Ok(instruction)
}

/// Cuts a trailing `;` comment, leaving semicolons inside string literals.
fn strip_comment(line: &str) -> &str {
    let mut quoted = false;
    let mut escaped = false;
    for (index, ch) in line.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => return &line[..index],
            _ => {}
        }
    }
    line
}

fn unescape(literal: &str) -> String {
    let mut result = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some(other @ ('\\' | '"')) => result.push(other),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn run(text: &str, input: &str) -> VmResult<String> {
        Vm::load(text)?.run(input)
    }

    #[test]
    fn executes_calls_with_stack_offsets() {
        let program = indoc! {r#"
            .data
                str0: .string "n=;\t"
            .text
            main:
                mov r0, 41
                push r0            ; arg 0
                call fn_show
                drop 1
                halt

            fn_show:
                load r0, [sp+1]    ; n
                mov r1, 1
                add r0, r0, r1
                lea r1, str0
                concat r1, r1, r0
                out.str r1
                ret
        "#};
        assert_eq!(run(program, "").unwrap(), "n=;\t42");
    }

    #[test]
    fn branches_and_reads_input() {
        let program = indoc! {"
            main:
                in r0
                mov r1, 0
            loop_0:
                mov r2, 3
                lt r3, r1, r2
                jz r3, endloop_1
                out.str r0
                mov r2, 1
                add r1, r1, r2
                jmp loop_0
            endloop_1:
                mov r2, false
                not r2, r2
                out.bool r2
                halt
        "};
        assert_eq!(run(program, "hi\n").unwrap(), "hi\nhi\nhi\ntrue");
    }

    #[test]
    fn reports_runtime_faults() {
        let divide = "main:\n mov r0, 1\n mov r1, 0\n div r0, r0, r1\n";
        assert_eq!(run(divide, ""), Err(VmError::DivisionByZero));
        assert_eq!(run("main:\n pop r0\n", ""), Err(VmError::StackUnderflow));
        assert_eq!(
            run("main:\n out.int r4\n", ""),
            Err(VmError::UninitializedRegister { register: 4 })
        );
        assert!(matches!(
            run("main:\n jmp nowhere\n", ""),
            Err(VmError::UnknownLabel { .. })
        ));
        assert!(matches!(
            run("main:\n frobnicate r0\n", ""),
            Err(VmError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn negation_truncation_and_comparisons() {
        let program = indoc! {"
            main:
                mov r0, -7
                mov r1, 2
                div r2, r0, r1
                out.int r2
                neg r2, r2
                out.int r2
                eq r3, r0, r1
                out.bool r3
        "};
        assert_eq!(run(program, "").unwrap(), "-3\n3\nfalse");
    }
}
