use thiserror::Error;

use crate::lexer::LexError;
use crate::symbols::ValueType;

pub type CompileResult<T> = Result<T, CompileError>;

/// Failure families. Every error is fatal for the whole compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Syntax,
    Binding,
    Type,
    Allocation,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("Syntax error in <{rule}>: unexpected {found} at line {line}, column {column}")]
    UnexpectedTerminal {
        rule: &'static str,
        found: String,
        line: usize,
        column: usize,
    },
    #[error("Syntax error: expected {expected}, got {found} at line {line}, column {column}")]
    MismatchedTerminal {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },
    #[error("Syntax error in <{rule}>: expression ends unexpectedly at line {line}, column {column}")]
    UnexpectedEnd {
        rule: &'static str,
        line: usize,
        column: usize,
    },

    #[error("Improper binding: {kind} of {construct} onto {target}: {detail}")]
    ImproperBinding {
        kind: &'static str,
        construct: &'static str,
        target: &'static str,
        detail: &'static str,
    },

    #[error("Type error: operator '{operator}' cannot combine {left} and {right}")]
    OperandMismatch {
        operator: &'static str,
        left: String,
        right: String,
    },
    #[error("Type error: {context} expects {expected}, got {found}")]
    ExpectedType {
        context: &'static str,
        expected: ValueType,
        found: ValueType,
    },
    #[error("Type error: variable '{name}' holds {declared}, cannot assign {found}")]
    Reassignment {
        name: String,
        declared: ValueType,
        found: ValueType,
    },
    #[error("Type error: '{name}' is not a function")]
    NotAFunction { name: String },
    #[error("Type error: function '{name}' expects {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Type error: argument {index} of '{name}' expects {expected}, got {found}")]
    ArgumentMismatch {
        name: String,
        index: usize,
        expected: ValueType,
        found: ValueType,
    },
    #[error("Type error: {construct} is missing its {part}")]
    MissingOperand {
        construct: &'static str,
        part: &'static str,
    },

    #[error("Allocation error: variable '{name}' is neither in a register nor on the stack")]
    UnresolvedVariable { name: String },
    #[error("Allocation error: {message}")]
    AllocatorInvariant { message: &'static str },
    #[error("Target {target} does not support {feature}")]
    Unsupported {
        target: &'static str,
        feature: &'static str,
    },
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Lex(_) => ErrorKind::Lex,
            CompileError::UnexpectedTerminal { .. }
            | CompileError::MismatchedTerminal { .. }
            | CompileError::UnexpectedEnd { .. } => ErrorKind::Syntax,
            CompileError::ImproperBinding { .. } => ErrorKind::Binding,
            CompileError::OperandMismatch { .. }
            | CompileError::ExpectedType { .. }
            | CompileError::Reassignment { .. }
            | CompileError::NotAFunction { .. }
            | CompileError::ArityMismatch { .. }
            | CompileError::ArgumentMismatch { .. }
            | CompileError::MissingOperand { .. } => ErrorKind::Type,
            CompileError::UnresolvedVariable { .. }
            | CompileError::AllocatorInvariant { .. }
            | CompileError::Unsupported { .. } => ErrorKind::Allocation,
        }
    }
}
