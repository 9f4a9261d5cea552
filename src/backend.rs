use anyhow::{Result, bail};

use crate::codegen::pool::StringPool;
use crate::codegen::writer::Writer;
use crate::error::CompileResult;
use crate::grammar::Construct;
use crate::symbols::ValueType;

pub mod asm;
pub mod mips;
pub mod python;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal<'a> {
    Integer(&'a str),
    Boolean(bool),
    /// Label of a pooled string.
    String(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotName {
    Variable(String),
    Hidden(usize),
    Spill,
}

/// A stack slot, addressed both by its distance from the stack top in words
/// and by name, so targets without an explicit stack can use variables.
/// `position` counts from the bottom of the frame and tells shadowed names
/// apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub offset: usize,
    pub position: usize,
    pub name: SlotName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operands {
    pub lhs: ValueType,
    pub rhs: ValueType,
    pub result: ValueType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub else_label: String,
    pub end_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopLabels {
    pub top: String,
    pub exit: String,
}

/// Emission contract shared by every target.
///
/// The generator owns register allocation and the stack model; a backend only
/// turns each abstract step into target text. Register operands arrive as
/// names produced by [`Backend::register`].
pub trait Backend {
    fn name(&self) -> &'static str;
    /// Extension of the output file, without the dot.
    fn extension(&self) -> &'static str;
    /// Register count when none is requested; `None` means unbounded.
    fn default_registers(&self) -> Option<usize>;
    /// Largest register count the target can name.
    fn max_registers(&self) -> Option<usize> {
        None
    }
    fn register(&self, index: usize) -> String;
    fn comment_prefix(&self) -> &'static str;

    fn indent_unit(&self) -> &'static str {
        "    "
    }

    /// Whether a call may overwrite the caller's registers.
    fn clobbers_registers(&self) -> bool {
        true
    }

    fn function_label(&self, name: &str) -> String {
        format!("fn_{name}")
    }

    fn header(&self, out: &mut Writer);
    fn io_setup(&self, _out: &mut Writer) {}
    fn data_section(&self, out: &mut Writer, pool: &StringPool);
    fn main_begin(&self, out: &mut Writer);
    fn main_end(&self, out: &mut Writer);
    fn footer(&self, _out: &mut Writer) {}

    fn terminal(&self, out: &mut Writer, dest: &str, literal: Literal<'_>);
    fn calculation(
        &self,
        out: &mut Writer,
        op: Construct,
        dest: &str,
        lhs: &str,
        rhs: &str,
        operands: Operands,
    ) -> CompileResult<()>;
    fn not(&self, out: &mut Writer, dest: &str, src: &str);
    fn negate(&self, out: &mut Writer, dest: &str, src: &str);

    fn load(&self, out: &mut Writer, dest: &str, slot: &Slot);
    fn store(&self, out: &mut Writer, slot: &Slot, src: &str);
    /// Pushes `src` as the home slot of a new variable.
    fn declare(&self, out: &mut Writer, slot: &Slot, src: &str);
    fn push(&self, out: &mut Writer, src: &str, comment: &str);
    fn pop(&self, out: &mut Writer, dest: &str, comment: &str);
    /// Discards `count` slots from the stack top.
    fn release(&self, out: &mut Writer, count: usize);

    fn output(&self, out: &mut Writer, src: &str, ty: ValueType) -> CompileResult<()>;
    fn input(&self, out: &mut Writer, dest: &str);

    fn if_begin(&self, out: &mut Writer, condition: &str, branch: &Branch);
    fn if_else(&self, out: &mut Writer, branch: &Branch);
    fn if_end(&self, out: &mut Writer, branch: &Branch, has_else: bool);
    fn loop_begin(&self, out: &mut Writer, labels: &LoopLabels);
    /// Leaves the loop when `condition` is false.
    fn loop_test(&self, out: &mut Writer, condition: &str, labels: &LoopLabels);
    fn loop_end(&self, out: &mut Writer, labels: &LoopLabels);

    /// Opens a function whose stack holds `params` (first pushed first)
    /// below the return slot.
    fn function_begin(&self, out: &mut Writer, label: &str, params: &[Slot]);
    fn function_end(&self, out: &mut Writer);
    fn argument(&self, out: &mut Writer, index: usize, src: &str);
    fn call(&self, out: &mut Writer, label: &str, argc: usize);

    /// Executes emitted code, feeding `input` line by line, and returns what
    /// the program printed.
    fn run(&self, _code: &str, _input: &str) -> Result<String> {
        bail!("Target '{}' cannot be run in-process", self.name())
    }
}
