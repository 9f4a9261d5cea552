//! SPIM-flavoured MIPS32.
//!
//! Stack slots are words addressed from `$sp`. A function pushes `$ra` on
//! entry, which is the return slot the generator reserves above the
//! parameters. String work goes through the helpers in [`runtime`].

use crate::backend::{Backend, Branch, Literal, LoopLabels, Operands, Slot, SlotName};
use crate::codegen::pool::StringPool;
use crate::codegen::writer::Writer;
use crate::error::{CompileError, CompileResult};
use crate::grammar::Construct;
use crate::symbols::ValueType;

mod runtime;

use runtime::{MIPS_DATA, MIPS_HELPERS};

const WORD: usize = 4;

pub struct Mips;

impl Mips {
    fn slot_address(slot: &Slot) -> String {
        format!("{}($sp)", slot.offset * WORD)
    }

    fn slot_comment(slot: &Slot) -> String {
        match &slot.name {
            SlotName::Variable(name) => name.clone(),
            SlotName::Hidden(n) => format!("bound {n}"),
            SlotName::Spill => "spilled temp".to_string(),
        }
    }

    /// Leaves the string form of `src` in `dest` (a `$t` or `$a` register).
    fn stringify(out: &mut Writer, dest: &str, src: &str, ty: ValueType) {
        match ty {
            ValueType::String => {
                if dest != src {
                    out.line(&format!("move {dest}, {src}"));
                }
            }
            ValueType::Integer | ValueType::Boolean => {
                let helper = if ty == ValueType::Integer {
                    "__itoa"
                } else {
                    "__btoa"
                };
                out.line(&format!("move $a0, {src}"));
                out.line(&format!("jal {helper}"));
                out.line(&format!("move {dest}, $v0"));
            }
        }
    }

    fn print_string(out: &mut Writer, src: &str) {
        out.line(&format!("move $a0, {src}"));
        out.line("li $v0, 4");
        out.line("syscall");
    }
}

impl Backend for Mips {
    fn name(&self) -> &'static str {
        "mips"
    }

    fn extension(&self) -> &'static str {
        "s"
    }

    fn default_registers(&self) -> Option<usize> {
        Some(8)
    }

    fn max_registers(&self) -> Option<usize> {
        Some(18)
    }

    fn register(&self, index: usize) -> String {
        if index < 10 {
            format!("$t{index}")
        } else {
            format!("$s{}", index - 10)
        }
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }

    fn header(&self, out: &mut Writer) {
        out.comment("generated by scriptc");
    }

    fn data_section(&self, out: &mut Writer, pool: &StringPool) {
        out.label(".data");
        for (label, literal) in pool.entries() {
            out.line(&format!("{label}: .asciiz \"{literal}\""));
        }
        out.raw(MIPS_DATA);
    }

    fn main_begin(&self, out: &mut Writer) {
        out.label(".text");
        out.label(".globl main");
        out.label("main:");
        out.indent();
    }

    fn main_end(&self, out: &mut Writer) {
        out.line("li $v0, 10");
        out.line("syscall");
        out.dedent();
    }

    fn footer(&self, out: &mut Writer) {
        for helper in MIPS_HELPERS {
            out.blank();
            out.raw(helper);
        }
    }

    fn terminal(&self, out: &mut Writer, dest: &str, literal: Literal<'_>) {
        match literal {
            Literal::Integer(value) => out.line(&format!("li {dest}, {value}")),
            Literal::Boolean(value) => out.line(&format!("li {dest}, {}", u8::from(value))),
            Literal::String(label) => out.line(&format!("la {dest}, {label}")),
        }
    }

    fn calculation(
        &self,
        out: &mut Writer,
        op: Construct,
        dest: &str,
        lhs: &str,
        rhs: &str,
        operands: Operands,
    ) -> CompileResult<()> {
        let strings = operands.lhs == ValueType::String && operands.rhs == ValueType::String;
        match op {
            Construct::Add if operands.result == ValueType::String => {
                Self::stringify(out, dest, lhs, operands.lhs);
                Self::stringify(out, "$a1", rhs, operands.rhs);
                out.line(&format!("move $a0, {dest}"));
                out.line("jal __concat");
                out.line(&format!("move {dest}, $v0"));
            }
            Construct::Eq | Construct::Ne if strings => {
                out.line(&format!("move $a0, {lhs}"));
                out.line(&format!("move $a1, {rhs}"));
                out.line("jal __streq");
                if op == Construct::Eq {
                    out.line(&format!("move {dest}, $v0"));
                } else {
                    out.line(&format!("xori {dest}, $v0, 1"));
                }
            }
            Construct::Lt | Construct::Le | Construct::Gt | Construct::Ge if strings => {
                return Err(CompileError::Unsupported {
                    target: self.name(),
                    feature: "ordering comparisons between strings",
                });
            }
            _ => {
                let mnemonic = match op {
                    Construct::Add => "addu",
                    Construct::Sub => "subu",
                    Construct::Mul => "mul",
                    Construct::Div => "div",
                    Construct::And => "and",
                    Construct::Or => "or",
                    Construct::Eq => "seq",
                    Construct::Ne => "sne",
                    Construct::Lt => "slt",
                    Construct::Le => "sle",
                    Construct::Gt => "sgt",
                    _ => "sge",
                };
                out.line(&format!("{mnemonic} {dest}, {lhs}, {rhs}"));
            }
        }
        Ok(())
    }

    fn not(&self, out: &mut Writer, dest: &str, src: &str) {
        out.line(&format!("xori {dest}, {src}, 1"));
    }

    fn negate(&self, out: &mut Writer, dest: &str, src: &str) {
        out.line(&format!("subu {dest}, $zero, {src}"));
    }

    fn load(&self, out: &mut Writer, dest: &str, slot: &Slot) {
        out.line_with_comment(
            &format!("lw {dest}, {}", Self::slot_address(slot)),
            &Self::slot_comment(slot),
        );
    }

    fn store(&self, out: &mut Writer, slot: &Slot, src: &str) {
        out.line_with_comment(
            &format!("sw {src}, {}", Self::slot_address(slot)),
            &Self::slot_comment(slot),
        );
    }

    fn declare(&self, out: &mut Writer, slot: &Slot, src: &str) {
        self.push(out, src, &format!("var {}", Self::slot_comment(slot)));
    }

    fn push(&self, out: &mut Writer, src: &str, comment: &str) {
        out.line_with_comment(&format!("addiu $sp, $sp, -{WORD}"), comment);
        out.line(&format!("sw {src}, 0($sp)"));
    }

    fn pop(&self, out: &mut Writer, dest: &str, comment: &str) {
        out.line_with_comment(&format!("lw {dest}, 0($sp)"), comment);
        out.line(&format!("addiu $sp, $sp, {WORD}"));
    }

    fn release(&self, out: &mut Writer, count: usize) {
        out.line(&format!("addiu $sp, $sp, {}", count * WORD));
    }

    fn output(&self, out: &mut Writer, src: &str, ty: ValueType) -> CompileResult<()> {
        match ty {
            ValueType::Integer => {
                out.line(&format!("move $a0, {src}"));
                out.line("li $v0, 1");
                out.line("syscall");
            }
            ValueType::String => Self::print_string(out, src),
            ValueType::Boolean => {
                out.line(&format!("move $a0, {src}"));
                out.line("jal __btoa");
                Self::print_string(out, "$v0");
            }
        }
        out.line("la $a0, __newline");
        out.line("li $v0, 4");
        out.line("syscall");
        Ok(())
    }

    fn input(&self, out: &mut Writer, dest: &str) {
        out.line("jal __read");
        out.line(&format!("move {dest}, $v0"));
    }

    fn if_begin(&self, out: &mut Writer, condition: &str, branch: &Branch) {
        out.line(&format!("beqz {condition}, {}", branch.else_label));
    }

    fn if_else(&self, out: &mut Writer, branch: &Branch) {
        out.line(&format!("j {}", branch.end_label));
        out.label(&format!("{}:", branch.else_label));
    }

    fn if_end(&self, out: &mut Writer, branch: &Branch, has_else: bool) {
        let label = if has_else {
            &branch.end_label
        } else {
            &branch.else_label
        };
        out.label(&format!("{label}:"));
    }

    fn loop_begin(&self, out: &mut Writer, labels: &LoopLabels) {
        out.label(&format!("{}:", labels.top));
    }

    fn loop_test(&self, out: &mut Writer, condition: &str, labels: &LoopLabels) {
        out.line(&format!("beqz {condition}, {}", labels.exit));
    }

    fn loop_end(&self, out: &mut Writer, labels: &LoopLabels) {
        out.line(&format!("j {}", labels.top));
        out.label(&format!("{}:", labels.exit));
    }

    fn function_begin(&self, out: &mut Writer, label: &str, params: &[Slot]) {
        out.label(&format!("{label}:"));
        out.indent();
        for param in params {
            out.comment(&format!(
                "{} at {}",
                Self::slot_comment(param),
                Self::slot_address(param)
            ));
        }
        self.push(out, "$ra", "return address");
    }

    fn function_end(&self, out: &mut Writer) {
        self.pop(out, "$ra", "return address");
        out.line("jr $ra");
        out.dedent();
    }

    fn argument(&self, out: &mut Writer, index: usize, src: &str) {
        self.push(out, src, &format!("arg {index}"));
    }

    fn call(&self, out: &mut Writer, label: &str, _argc: usize) {
        out.line(&format!("jal {label}"));
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CompileError;
    use crate::{CompileOptions, Target, compile};

    fn emit(source: &str) -> Result<String, CompileError> {
        let options = CompileOptions {
            target: Target::Mips,
            registers: None,
        };
        compile(source, &options)
    }

    #[test]
    fn data_section_and_helpers_surround_code() {
        let code = emit(r#"var s = "n=" + 4; echo s;"#).unwrap();
        assert!(code.contains(r#"str0: .asciiz "n=""#));
        assert!(code.find(".data").unwrap() < code.find("main:").unwrap());
        assert!(code.contains("jal __itoa"));
        assert!(code.contains("jal __concat"));
        assert!(code.contains("\n__concat:\n"));
        assert!(code.contains("li $v0, 10"));
    }

    #[test]
    fn string_escapes_are_kept_verbatim() {
        let code = emit(r#"echo "a\nb";"#).unwrap();
        assert!(code.contains("str0: .asciiz \"a\\nb\"\n"));
    }

    #[test]
    fn functions_save_the_return_address() {
        let code = emit("function f(a) { echo a; }\nf(5);\n").unwrap();
        let body = &code[code.find("fn_f:").unwrap()..];
        assert!(body.contains("sw $ra, 0($sp)"));
        assert!(body.contains("lw $t0, 4($sp)"));
        assert!(body.contains("jr $ra"));
        assert!(code.contains("jal fn_f"));
    }

    #[test]
    fn string_ordering_is_unsupported() {
        let error = emit(r#"echo "a" < "b";"#).unwrap_err();
        assert!(matches!(error, CompileError::Unsupported { target: "mips", .. }));
    }

    #[test]
    fn rejects_more_registers_than_it_can_name() {
        let options = CompileOptions {
            target: Target::Mips,
            registers: Some(19),
        };
        assert!(matches!(
            compile("echo 1;", &options),
            Err(CompileError::Unsupported { .. })
        ));
    }
}
