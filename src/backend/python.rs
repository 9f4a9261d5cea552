use anyhow::Result;

use crate::backend::{Backend, Branch, Literal, LoopLabels, Operands, Slot, SlotName};
use crate::codegen::pool::StringPool;
use crate::codegen::writer::Writer;
use crate::error::CompileResult;
use crate::grammar::Construct;
use crate::symbols::ValueType;

mod runtime;

use runtime::{PY_ENTRY, PY_PRELUDE, run_script};

/// Python 3 source. Registers and stack slots become local variables, so the
/// register pool is unbounded and calls clobber nothing.
pub struct Python;

fn variable(slot: &Slot) -> String {
    match &slot.name {
        SlotName::Variable(name) => format!("{name}_{}", slot.position),
        SlotName::Hidden(n) => format!("_bound{n}"),
        SlotName::Spill => format!("_spill{}", slot.position),
    }
}

impl Backend for Python {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extension(&self) -> &'static str {
        "py"
    }

    fn default_registers(&self) -> Option<usize> {
        None
    }

    fn register(&self, index: usize) -> String {
        format!("t{index}")
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }

    fn clobbers_registers(&self) -> bool {
        false
    }

    fn header(&self, out: &mut Writer) {
        out.comment("generated by scriptc");
    }

    fn io_setup(&self, out: &mut Writer) {
        out.raw(PY_PRELUDE);
        out.blank();
    }

    fn data_section(&self, out: &mut Writer, pool: &StringPool) {
        for (label, literal) in pool.entries() {
            out.line(&format!("{label} = \"{literal}\""));
        }
        if !pool.is_empty() {
            out.blank();
        }
    }

    fn main_begin(&self, out: &mut Writer) {
        out.blank();
        out.line("def main():");
        out.open_block();
    }

    fn main_end(&self, out: &mut Writer) {
        out.close_block("pass");
    }

    fn footer(&self, out: &mut Writer) {
        out.blank();
        out.blank();
        out.raw(PY_ENTRY);
    }

    fn terminal(&self, out: &mut Writer, dest: &str, literal: Literal<'_>) {
        let value = match literal {
            Literal::Integer(value) | Literal::String(value) => value.to_string(),
            Literal::Boolean(true) => "True".to_string(),
            Literal::Boolean(false) => "False".to_string(),
        };
        out.line(&format!("{dest} = {value}"));
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
        let expression = match op {
            Construct::Add if operands.result == ValueType::String => {
                format!("_show({lhs}) + _show({rhs})")
            }
            Construct::Div => format!("_div({lhs}, {rhs})"),
            op => format!("{lhs} {} {rhs}", op.operator_symbol()),
        };
        out.line(&format!("{dest} = {expression}"));
        Ok(())
    }

    fn not(&self, out: &mut Writer, dest: &str, src: &str) {
        out.line(&format!("{dest} = not {src}"));
    }

    fn negate(&self, out: &mut Writer, dest: &str, src: &str) {
        out.line(&format!("{dest} = -{src}"));
    }

    fn load(&self, out: &mut Writer, dest: &str, slot: &Slot) {
        out.line(&format!("{dest} = {}", variable(slot)));
    }

    fn store(&self, out: &mut Writer, slot: &Slot, src: &str) {
        out.line(&format!("{} = {src}", variable(slot)));
    }

    fn declare(&self, out: &mut Writer, slot: &Slot, src: &str) {
        self.store(out, slot, src);
    }

    fn push(&self, out: &mut Writer, src: &str, comment: &str) {
        out.line_with_comment(&format!("_stack.append({src})"), comment);
    }

    fn pop(&self, out: &mut Writer, dest: &str, comment: &str) {
        out.line_with_comment(&format!("{dest} = _stack.pop()"), comment);
    }

    /// Slots are host variables that go out of use on their own.
    fn release(&self, _out: &mut Writer, _count: usize) {}

    fn output(&self, out: &mut Writer, src: &str, ty: ValueType) -> CompileResult<()> {
        match ty {
            ValueType::Boolean => out.line(&format!("print(_show({src}))")),
            ValueType::Integer | ValueType::String => out.line(&format!("print({src})")),
        }
        Ok(())
    }

    fn input(&self, out: &mut Writer, dest: &str) {
        out.line(&format!("{dest} = _read()"));
    }

    fn if_begin(&self, out: &mut Writer, condition: &str, _branch: &Branch) {
        out.line(&format!("if {condition}:"));
        out.open_block();
    }

    fn if_else(&self, out: &mut Writer, _branch: &Branch) {
        out.close_block("pass");
        out.line("else:");
        out.open_block();
    }

    fn if_end(&self, out: &mut Writer, _branch: &Branch, _has_else: bool) {
        out.close_block("pass");
    }

    fn loop_begin(&self, out: &mut Writer, _labels: &LoopLabels) {
        out.line("while True:");
        out.open_block();
    }

    fn loop_test(&self, out: &mut Writer, condition: &str, _labels: &LoopLabels) {
        out.line(&format!("if not {condition}:"));
        out.indent();
        out.line("break");
        out.dedent();
    }

    fn loop_end(&self, out: &mut Writer, _labels: &LoopLabels) {
        out.close_block("pass");
    }

    fn function_begin(&self, out: &mut Writer, label: &str, params: &[Slot]) {
        let params = params.iter().map(variable).collect::<Vec<_>>().join(", ");
        out.blank();
        out.line(&format!("def {label}({params}):"));
        out.open_block();
    }

    fn function_end(&self, out: &mut Writer) {
        out.close_block("pass");
    }

    fn argument(&self, out: &mut Writer, index: usize, src: &str) {
        out.line(&format!("_a{index} = {src}"));
    }

    fn call(&self, out: &mut Writer, label: &str, argc: usize) {
        let args = (0..argc)
            .map(|index| format!("_a{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        out.line(&format!("{label}({args})"));
    }

    fn run(&self, code: &str, input: &str) -> Result<String> {
        run_script(code, input)
    }
}

#[cfg(test)]
mod tests {
    use crate::{CompileOptions, Target, compile};

    fn emit(source: &str) -> String {
        let options = CompileOptions {
            target: Target::Python,
            registers: None,
        };
        compile(source, &options).unwrap()
    }

    #[test]
    fn structured_control_flow_replaces_labels() {
        let code = emit("var i = 0;\nwhile (i < 3) { i = i + 1; }\nif (i == 3) { } else { echo i; }\n");
        let loop_body = &code[code.find("    while True:\n").unwrap()..];
        let test = loop_body.find("        if not t").unwrap();
        assert!(loop_body[test..].contains(":\n            break\n"));
        assert!(code.contains("        pass\n    else:\n"));
        assert!(!code.contains("_stack.append"));
    }

    #[test]
    fn string_escapes_are_kept_verbatim() {
        let code = emit(r#"echo "a\nb";"#);
        assert!(code.contains("str0 = \"a\\nb\"\n"));
    }

    #[test]
    fn shadowed_names_get_distinct_variables() {
        let code = emit("var x = 1;\nif (true) { var x = 2; echo x; }\necho x;\n");
        assert!(code.contains("x_0 = t0"));
        assert!(code.contains("x_1 = t0"));
    }

    #[test]
    fn functions_take_named_parameters() {
        let code = emit("function add(a, b) { echo a + b; }\nadd(1, 2);\n");
        assert!(code.contains("def fn_add(a_0, b_1):"));
        assert!(code.contains("fn_add(_a0, _a1)"));
        let entry = code.find("if __name__").unwrap();
        assert!(code.find("def fn_add").unwrap() < entry);
    }
}
