use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::{CompileError, CompileResult};
use crate::grammar::{Construct, Terminal};
use crate::symbols::{SymbolId, SymbolTable, ValueType, describe};
use crate::tree::{NodeId, Tree};

pub struct TypeChecker<'a> {
    tree: &'a mut Tree,
    symbols: &'a mut SymbolTable,
    /// Function body scopes, re-checked once a call pins an unknown parameter.
    bodies: FxHashMap<SymbolId, NodeId>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(tree: &'a mut Tree, symbols: &'a mut SymbolTable) -> Self {
        Self {
            tree,
            symbols,
            bodies: FxHashMap::default(),
        }
    }

    pub fn run(mut self) -> CompileResult<()> {
        if let Some(root) = self.tree.root() {
            self.visit(root)?;
            debug!(symbols = self.symbols.len(), "type checked");
        }
        Ok(())
    }

    fn visit(&mut self, id: NodeId) -> CompileResult<Option<ValueType>> {
        let construct = self.tree.get(id).construct;
        let ty = match construct {
            Construct::Integer | Construct::String | Construct::Boolean => {
                self.tree.get(id).terminal().and_then(Terminal::literal_type)
            }
            Construct::Variable => self.tree.get(id).symbol.and_then(|sym| self.symbols.get(sym).ty),
            Construct::Add
            | Construct::Sub
            | Construct::Mul
            | Construct::Div
            | Construct::And
            | Construct::Or
            | Construct::Eq
            | Construct::Ne
            | Construct::Lt
            | Construct::Le
            | Construct::Gt
            | Construct::Ge => self.binary(id, construct)?,
            Construct::Not => {
                let [operand] = self.operands::<1>(id, construct, ["operand"])?;
                let found = self.visit(operand)?;
                expect_or_unknown("'not'", ValueType::Boolean, found)?;
                Some(ValueType::Boolean)
            }
            Construct::Scope => {
                self.visit_children(id)?;
                None
            }
            Construct::VarDecl => {
                let [name, value] = self.operands::<2>(id, construct, ["name", "value"])?;
                let found = self.visit(value)?;
                let ty = self.assign(name, found)?;
                self.tree.get_mut(name).ty = ty;
                ty
            }
            Construct::VarSet => {
                let [value] = self.operands::<1>(id, construct, ["value"])?;
                let found = self.visit(value)?;
                self.assign(id, found)?
            }
            Construct::Input => {
                let [name] = self.operands::<1>(id, construct, ["variable"])?;
                let ty = self.assign(name, Some(ValueType::String))?;
                self.tree.get_mut(name).ty = ty;
                None
            }
            Construct::Output => {
                let [value] = self.operands::<1>(id, construct, ["operand"])?;
                self.visit(value)?;
                None
            }
            Construct::If => {
                let children = self.tree.children(id).collect::<Vec<_>>();
                let Some(&condition) = children.first() else {
                    return Err(missing(construct, "condition"));
                };
                if children.len() < 2 {
                    return Err(missing(construct, "body"));
                }
                let found = self.visit(condition)?;
                expect_or_unknown("condition", ValueType::Boolean, found)?;
                for branch in &children[1..] {
                    self.visit(*branch)?;
                }
                None
            }
            Construct::Loop => {
                self.loop_(id)?;
                None
            }
            Construct::FuncDef => {
                self.definition(id)?;
                None
            }
            Construct::FuncCall => {
                self.call(id)?;
                None
            }
            Construct::Pass | Construct::Null => None,
        };

        let node = self.tree.get(id);
        if node.negated {
            expect_or_unknown("negation", ValueType::Integer, ty)?;
        }
        self.tree.get_mut(id).ty = ty;
        trace!(construct = construct.name(), ty = %describe(ty), "typed");
        Ok(ty)
    }

    fn visit_children(&mut self, id: NodeId) -> CompileResult<()> {
        let children = self.tree.children(id).collect::<Vec<_>>();
        for child in children {
            self.visit(child)?;
        }
        Ok(())
    }

    /// Fetches exactly `N` children, naming the first missing one.
    fn operands<const N: usize>(
        &self,
        id: NodeId,
        construct: Construct,
        parts: [&'static str; N],
    ) -> CompileResult<[NodeId; N]> {
        let children = self.tree.children(id).collect::<Vec<_>>();
        if let Some(part) = parts.get(children.len()) {
            return Err(missing(construct, part));
        }
        let mut out = [id; N];
        out.copy_from_slice(&children[..N]);
        Ok(out)
    }

    fn binary(&mut self, id: NodeId, construct: Construct) -> CompileResult<Option<ValueType>> {
        let [left, right] = self.operands::<2>(id, construct, ["left operand", "right operand"])?;
        let lhs = self.visit(left)?;
        let rhs = self.visit(right)?;
        let operator = construct.operator_symbol();
        let mismatch = || CompileError::OperandMismatch {
            operator,
            left: describe(lhs),
            right: describe(rhs),
        };

        let ty = match construct {
            Construct::Add if lhs == Some(ValueType::String) || rhs == Some(ValueType::String) => {
                Some(ValueType::String)
            }
            Construct::Add | Construct::Sub | Construct::Mul | Construct::Div => {
                let ty = unify(lhs, rhs).ok_or_else(mismatch)?;
                ty.or(Some(ValueType::Integer))
            }
            Construct::And | Construct::Or => {
                let context = if construct == Construct::And { "'and'" } else { "'or'" };
                expect_or_unknown(context, ValueType::Boolean, lhs)?;
                expect_or_unknown(context, ValueType::Boolean, rhs)?;
                Some(ValueType::Boolean)
            }
            _ => {
                unify(lhs, rhs).ok_or_else(mismatch)?;
                Some(ValueType::Boolean)
            }
        };
        Ok(ty)
    }

    /// Records `found` on the symbol named by `id`; a type fixed earlier wins
    /// and must agree.
    fn assign(&mut self, id: NodeId, found: Option<ValueType>) -> CompileResult<Option<ValueType>> {
        let Some(sym) = self.tree.get(id).symbol else {
            return Err(missing(self.tree.get(id).construct, "variable name"));
        };
        let symbol = self.symbols.get_mut(sym);
        match (symbol.ty, found) {
            (Some(declared), Some(found)) if declared != found => Err(CompileError::Reassignment {
                name: symbol.name.clone(),
                declared,
                found,
            }),
            (declared, found) => {
                symbol.ty = declared.or(found);
                Ok(symbol.ty)
            }
        }
    }

    fn loop_(&mut self, id: NodeId) -> CompileResult<()> {
        let children = self.tree.children(id).collect::<Vec<_>>();
        if self.tree.get(id).terminal() == Some(Terminal::For) {
            let &[counter, start, end, body] = children.as_slice() else {
                return Err(missing(Construct::Loop, "counter, bounds or body"));
            };
            for bound in [start, end] {
                let found = self.visit(bound)?;
                expect_or_unknown("loop bound", ValueType::Integer, found)?;
            }
            let counter_ty = self.tree.get(counter).symbol.and_then(|sym| self.symbols.get(sym).ty);
            expect_or_unknown("loop counter", ValueType::Integer, counter_ty)?;
            self.assign(counter, Some(ValueType::Integer))?;
            self.tree.get_mut(counter).ty = Some(ValueType::Integer);
            self.visit(body)?;
        } else {
            let &[condition, body] = children.as_slice() else {
                return Err(missing(Construct::Loop, "condition or body"));
            };
            let found = self.visit(condition)?;
            expect_or_unknown("condition", ValueType::Boolean, found)?;
            self.visit(body)?;
        }
        Ok(())
    }

    fn definition(&mut self, id: NodeId) -> CompileResult<()> {
        let children = self.tree.children(id).collect::<Vec<_>>();
        let (Some(&name), Some(&body)) = (children.first(), children.last()) else {
            return Err(missing(Construct::FuncDef, "name"));
        };
        if children.len() < 2 || self.tree.get(body).construct != Construct::Scope {
            return Err(missing(Construct::FuncDef, "body"));
        }
        let Some(sym) = self.tree.get(name).symbol else {
            return Err(missing(Construct::FuncDef, "name"));
        };
        let params = &children[1..children.len() - 1];

        // Marked before the body so recursive calls resolve.
        let symbol = self.symbols.get_mut(sym);
        symbol.is_function = true;
        symbol.params = vec![None; params.len()];
        self.bodies.insert(sym, body);

        self.visit(body)?;
        let types = params
            .iter()
            .map(|param| {
                let ty = self.tree.get(*param).symbol.and_then(|p| self.symbols.get(p).ty);
                self.tree.get_mut(*param).ty = ty;
                ty
            })
            .collect::<Vec<_>>();
        let symbol = self.symbols.get_mut(sym);
        for (slot, ty) in symbol.params.iter_mut().zip(types) {
            *slot = slot.or(ty);
        }
        Ok(())
    }

    fn call(&mut self, id: NodeId) -> CompileResult<()> {
        let Some(sym) = self.tree.get(id).symbol else {
            return Err(missing(Construct::FuncCall, "function name"));
        };
        let args = self.tree.children(id).collect::<Vec<_>>();
        let mut found = Vec::with_capacity(args.len());
        for arg in &args {
            found.push(self.visit(*arg)?);
        }

        let symbol = self.symbols.get(sym);
        let name = symbol.name.clone();
        if !symbol.is_function {
            return Err(CompileError::NotAFunction { name });
        }
        if symbol.params.len() != args.len() {
            return Err(CompileError::ArityMismatch {
                name,
                expected: symbol.params.len(),
                found: args.len(),
            });
        }

        let mut adopted = false;
        for (index, arg_ty) in found.into_iter().enumerate() {
            match (self.symbols.get(sym).params[index], arg_ty) {
                (Some(expected), Some(arg)) if expected != arg => {
                    return Err(CompileError::ArgumentMismatch {
                        name,
                        index: index + 1,
                        expected,
                        found: arg,
                    });
                }
                (None, Some(arg)) => {
                    self.symbols.get_mut(sym).params[index] = Some(arg);
                    self.pin_parameter(sym, index, arg)?;
                    adopted = true;
                }
                _ => {}
            }
        }

        if adopted && let Some(&body) = self.bodies.get(&sym) {
            trace!(function = %name, "re-checking body with adopted parameter types");
            self.visit(body)?;
        }
        Ok(())
    }

    /// Gives the parameter's own symbol the type its first call supplied.
    fn pin_parameter(&mut self, function: SymbolId, index: usize, ty: ValueType) -> CompileResult<()> {
        let Some(&body) = self.bodies.get(&function) else {
            return Ok(());
        };
        let Some(definition) = self.tree.parent(body) else {
            return Ok(());
        };
        if let Some(param) = self.tree.child(definition, index + 1) {
            self.assign(param, Some(ty))?;
            self.tree.get_mut(param).ty = Some(ty);
        }
        Ok(())
    }
}

fn missing(construct: Construct, part: &'static str) -> CompileError {
    CompileError::MissingOperand {
        construct: construct.name(),
        part,
    }
}

/// `None` when both types are known and differ.
fn unify(lhs: Option<ValueType>, rhs: Option<ValueType>) -> Option<Option<ValueType>> {
    match (lhs, rhs) {
        (Some(l), Some(r)) if l != r => None,
        (l, r) => Some(l.or(r)),
    }
}

fn expect_or_unknown(
    context: &'static str,
    expected: ValueType,
    found: Option<ValueType>,
) -> CompileResult<()> {
    match found {
        Some(found) if found != expected => Err(CompileError::ExpectedType {
            context,
            expected,
            found,
        }),
        _ => Ok(()),
    }
}

pub fn check(tree: &mut Tree, symbols: &mut SymbolTable) -> CompileResult<()> {
    TypeChecker::new(tree, symbols).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lexer::tokenize;
    use crate::optimizer::optimize;
    use crate::parser::parse;
    use indoc::indoc;

    fn checked(source: &str) -> CompileResult<(Tree, SymbolTable)> {
        let mut symbols = SymbolTable::new();
        let tokens = tokenize(source, &mut symbols)?;
        let parse_tree = parse(&tokens)?;
        let mut tree = optimize(&parse_tree)?;
        check(&mut tree, &mut symbols)?;
        Ok((tree, symbols))
    }

    /// Type of the expression in `echo EXPR;`.
    fn echo_type(expression: &str) -> CompileResult<Option<ValueType>> {
        let (tree, _) = checked(&format!("echo {expression};"))?;
        let root = tree.root().expect("root");
        let output = tree.first_child(root).expect("output");
        let value = tree.first_child(output).expect("value");
        Ok(tree.get(value).ty)
    }

    #[test]
    fn string_plus_anything_is_a_string() {
        assert_eq!(echo_type("\"x=\" + 5").expect("check"), Some(ValueType::String));
        assert_eq!(echo_type("5 + \"x\"").expect("check"), Some(ValueType::String));
        assert_eq!(echo_type("5 + 6").expect("check"), Some(ValueType::Integer));
    }

    #[test]
    fn arithmetic_takes_the_agreed_operand_type() {
        assert_eq!(echo_type("true * false").expect("check"), Some(ValueType::Boolean));
        assert_eq!(echo_type("true + true").expect("check"), Some(ValueType::Boolean));
        assert_eq!(echo_type("\"a\" - \"b\"").expect("check"), Some(ValueType::String));
        assert_eq!(echo_type("7 / 2").expect("check"), Some(ValueType::Integer));
    }

    #[test]
    fn comparisons_and_logic_are_boolean() {
        assert_eq!(echo_type("1 < 2 and not false").expect("check"), Some(ValueType::Boolean));
        assert_eq!(echo_type("\"a\" == \"b\"").expect("check"), Some(ValueType::Boolean));
    }

    #[test]
    fn rejects_mixed_operands() {
        let err = echo_type("true and 5").expect_err("integer in 'and'");
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(matches!(err, CompileError::ExpectedType { .. }), "{err}");

        let err = echo_type("1 == true").expect_err("mixed comparison");
        assert!(matches!(err, CompileError::OperandMismatch { .. }), "{err}");

        let err = echo_type("\"a\" - 1").expect_err("string minus integer");
        assert!(matches!(err, CompileError::OperandMismatch { .. }), "{err}");

        let err = echo_type("true * 2").expect_err("boolean times integer");
        assert!(matches!(err, CompileError::OperandMismatch { .. }), "{err}");

        let err = echo_type("-true").expect_err("negated boolean");
        assert!(err.to_string().contains("negation"), "{err}");
    }

    #[test]
    fn declarations_fix_variable_types() {
        let (_, symbols) = checked("var x = 1; x = x * 2; input name;").expect("check");
        let x = symbols.lookup("x").expect("x");
        let name = symbols.lookup("name").expect("name");
        assert_eq!(symbols.get(x).ty, Some(ValueType::Integer));
        assert_eq!(symbols.get(name).ty, Some(ValueType::String));

        let err = checked("var x = 1; x = \"one\";").expect_err("reassignment");
        assert!(matches!(err, CompileError::Reassignment { .. }), "{err}");
    }

    #[test]
    fn loop_counters_must_be_integers() {
        checked("for (i = 1 to 3) { echo i; }").expect("integer counter");
        let err = checked("var i = \"a\"; for (i = 1 to 3) { }").expect_err("string counter");
        assert!(err.to_string().contains("loop counter"), "{err}");
        let err = checked("while (1) { }").expect_err("integer condition");
        assert!(err.to_string().contains("condition"), "{err}");
    }

    #[test]
    fn calls_check_arity_and_adopt_parameter_types() {
        let source = indoc! {"
            function greet(who, times) {
                for (i = 1 to times) { echo \"hi \" + who; }
            }
            greet(\"bob\", 2);
        "};
        let (_, symbols) = checked(source).expect("check");
        let greet = symbols.get(symbols.lookup("greet").expect("greet"));
        assert!(greet.is_function);
        assert_eq!(greet.params, vec![Some(ValueType::String), Some(ValueType::Integer)]);
        let who = symbols.lookup("who").expect("who");
        assert_eq!(symbols.get(who).ty, Some(ValueType::String));

        let err = checked("function f(a) { } f(1, 2);").expect_err("arity");
        assert!(matches!(err, CompileError::ArityMismatch { expected: 1, found: 2, .. }));

        let err = checked("function f(a) { } f(1); f(\"s\");").expect_err("argument type");
        assert!(matches!(err, CompileError::ArgumentMismatch { index: 1, .. }), "{err}");

        let err = checked("var v = 1; v(2);").expect_err("not a function");
        assert!(matches!(err, CompileError::NotAFunction { .. }));
    }

    #[test]
    fn recursive_functions_type_check() {
        let source = indoc! {"
            function countdown(n) {
                if (n > 0) { echo n; countdown(n - 1); }
            }
            countdown(3);
        "};
        let (_, symbols) = checked(source).expect("check");
        let countdown = symbols.get(symbols.lookup("countdown").expect("countdown"));
        assert_eq!(countdown.params, vec![Some(ValueType::Integer)]);
    }
}
