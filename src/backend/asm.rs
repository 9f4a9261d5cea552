//! Register-machine pseudo-assembly, executed by [`crate::vm`].

use anyhow::Result;

use crate::backend::{Backend, Branch, Literal, LoopLabels, Operands, Slot, SlotName};
use crate::codegen::pool::StringPool;
use crate::codegen::writer::Writer;
use crate::error::CompileResult;
use crate::grammar::Construct;
use crate::symbols::ValueType;
use crate::vm::Vm;

pub struct Asm;

fn slot_comment(slot: &Slot) -> String {
    match &slot.name {
        SlotName::Variable(name) => name.clone(),
        SlotName::Hidden(n) => format!("bound {n}"),
        SlotName::Spill => "spilled temp".to_string(),
    }
}

impl Backend for Asm {
    fn name(&self) -> &'static str {
        "asm"
    }

    fn extension(&self) -> &'static str {
        "asm"
    }

    fn default_registers(&self) -> Option<usize> {
        Some(8)
    }

    fn register(&self, index: usize) -> String {
        format!("r{index}")
    }

    fn comment_prefix(&self) -> &'static str {
        ";"
    }

    fn header(&self, out: &mut Writer) {
        out.comment("generated by scriptc");
    }

    fn io_setup(&self, out: &mut Writer) {
        out.label(".io stdin stdout");
    }

    fn data_section(&self, out: &mut Writer, pool: &StringPool) {
        out.label(".data");
        out.indent();
        for (label, literal) in pool.entries() {
            out.line(&format!("{label}: .string \"{literal}\""));
        }
        out.dedent();
    }

    fn main_begin(&self, out: &mut Writer) {
        out.label(".text");
        out.label("main:");
        out.indent();
    }

    fn main_end(&self, out: &mut Writer) {
        out.line("halt");
        out.dedent();
    }

    fn terminal(&self, out: &mut Writer, dest: &str, literal: Literal<'_>) {
        match literal {
            Literal::Integer(value) => out.line(&format!("mov {dest}, {value}")),
            Literal::Boolean(value) => out.line(&format!("mov {dest}, {value}")),
            Literal::String(label) => out.line(&format!("lea {dest}, {label}")),
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
        let mnemonic = match op {
            Construct::Add if operands.result == ValueType::String => "concat",
            Construct::Add => "add",
            Construct::Sub => "sub",
            Construct::Mul => "mul",
            Construct::Div => "div",
            Construct::And => "and",
            Construct::Or => "or",
            Construct::Eq => "eq",
            Construct::Ne => "ne",
            Construct::Lt => "lt",
            Construct::Le => "le",
            Construct::Gt => "gt",
            _ => "ge",
        };
        out.line(&format!("{mnemonic} {dest}, {lhs}, {rhs}"));
        Ok(())
    }

    fn not(&self, out: &mut Writer, dest: &str, src: &str) {
        out.line(&format!("not {dest}, {src}"));
    }

    fn negate(&self, out: &mut Writer, dest: &str, src: &str) {
        out.line(&format!("neg {dest}, {src}"));
    }

    fn load(&self, out: &mut Writer, dest: &str, slot: &Slot) {
        out.line_with_comment(
            &format!("load {dest}, [sp+{}]", slot.offset),
            &slot_comment(slot),
        );
    }

    fn store(&self, out: &mut Writer, slot: &Slot, src: &str) {
        out.line_with_comment(
            &format!("store [sp+{}], {src}", slot.offset),
            &slot_comment(slot),
        );
    }

    fn declare(&self, out: &mut Writer, slot: &Slot, src: &str) {
        out.line_with_comment(&format!("push {src}"), &format!("var {}", slot_comment(slot)));
    }

    fn push(&self, out: &mut Writer, src: &str, comment: &str) {
        out.line_with_comment(&format!("push {src}"), comment);
    }

    fn pop(&self, out: &mut Writer, dest: &str, comment: &str) {
        out.line_with_comment(&format!("pop {dest}"), comment);
    }

    fn release(&self, out: &mut Writer, count: usize) {
        out.line(&format!("drop {count}"));
    }

    fn output(&self, out: &mut Writer, src: &str, ty: ValueType) -> CompileResult<()> {
        let suffix = match ty {
            ValueType::Integer => "int",
            ValueType::String => "str",
            ValueType::Boolean => "bool",
        };
        out.line(&format!("out.{suffix} {src}"));
        Ok(())
    }

    fn input(&self, out: &mut Writer, dest: &str) {
        out.line(&format!("in {dest}"));
    }

    fn if_begin(&self, out: &mut Writer, condition: &str, branch: &Branch) {
        out.line(&format!("jz {condition}, {}", branch.else_label));
    }

    fn if_else(&self, out: &mut Writer, branch: &Branch) {
        out.line(&format!("jmp {}", branch.end_label));
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
        out.line(&format!("jz {condition}, {}", labels.exit));
    }

    fn loop_end(&self, out: &mut Writer, labels: &LoopLabels) {
        out.line(&format!("jmp {}", labels.top));
        out.label(&format!("{}:", labels.exit));
    }

    fn function_begin(&self, out: &mut Writer, label: &str, params: &[Slot]) {
        out.label(&format!("{label}:"));
        out.indent();
        for param in params {
            out.comment(&format!("{} at [sp+{}]", slot_comment(param), param.offset));
        }
    }

    fn function_end(&self, out: &mut Writer) {
        out.line("ret");
        out.dedent();
    }

    fn argument(&self, out: &mut Writer, index: usize, src: &str) {
        out.line_with_comment(&format!("push {src}"), &format!("arg {index}"));
    }

    fn call(&self, out: &mut Writer, label: &str, _argc: usize) {
        out.line(&format!("call {label}"));
    }

    fn run(&self, code: &str, input: &str) -> Result<String> {
        let mut vm = Vm::load(code)?;
        Ok(vm.run(input)?)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::{CompileOptions, Target, compile};

    fn emit(source: &str) -> String {
        let options = CompileOptions {
            target: Target::Asm,
            registers: None,
        };
        compile(source, &options).unwrap()
    }

    #[test]
    fn declaration_pushes_a_named_slot() {
        let code = emit("var x = 1 + 2;\necho x;\n");
        let body = code
            .lines()
            .skip_while(|line| *line != "main:")
            .map(|line| line.split(';').next().unwrap_or_default().trim_end())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(
            body,
            indoc! {"
                main:
                    mov r0, 1
                    mov r1, 2
                    add r0, r0, r1
                    push r0
                    out.int r0
                    halt"}
        );
    }

    #[test]
    fn string_pool_precedes_code() {
        let code = emit(r#"echo "a\nb"; echo "a\nb" + 1;"#);
        let data = code.find(".data").unwrap();
        let text = code.find(".text").unwrap();
        assert!(data < text);
        assert_eq!(code.matches(r#"str0: .string "a\nb""#).count(), 1);
        assert!(!code.contains("str1"));
        assert!(code.contains("concat r0, r0, r1"));
    }

    #[test]
    fn functions_follow_main() {
        let code = emit("function f(a) { echo a; }\nf(5);\n");
        let halt = code.find("halt").unwrap();
        let function = code.find("fn_f:").unwrap();
        assert!(halt < function);
        assert!(code.contains("call fn_f"));
        assert!(code.contains("load r0, [sp+1]"));
    }
}
