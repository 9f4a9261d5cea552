//! Parse tree to AST rewriting.

use tracing::{debug, trace};

use crate::error::{CompileError, CompileResult};
use crate::grammar::{Construct, Terminal};
use crate::tree::{NodeId, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Replace the node and its left sibling with one node carrying the
    /// sibling's name and both nodes' children.
    MoveUpwardAndLeft,
    /// Reparent the node as the first child of its left sibling.
    MoveRightToChild,
    /// Reparent the node as the last child of its left sibling.
    MoveLeftToChild,
}

impl BindingKind {
    fn name(self) -> &'static str {
        match self {
            BindingKind::MoveUpwardAndLeft => "move-upward-and-left",
            BindingKind::MoveRightToChild => "move-right-to-child",
            BindingKind::MoveLeftToChild => "move-left-to-child",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Is(Construct),
    /// Operators and leaf values share one set of rows.
    Expression,
}

impl Subject {
    fn matches(self, construct: Construct) -> bool {
        match self {
            Subject::Is(expected) => expected == construct,
            Subject::Expression => construct.is_expression(),
        }
    }
}

/// Shape test on the left sibling; a row only fires when it holds.
type Guard = fn(&Tree, NodeId) -> bool;

pub struct Binding {
    pub subject: Subject,
    pub sibling: Construct,
    pub kind: BindingKind,
    guard: Guard,
}

const fn row(subject: Subject, sibling: Construct, kind: BindingKind, guard: Guard) -> Binding {
    Binding {
        subject,
        sibling,
        kind,
        guard,
    }
}

fn is_empty(tree: &Tree, target: NodeId) -> bool {
    tree.first_child(target).is_none()
}

fn holds_one(tree: &Tree, target: NodeId) -> bool {
    tree.child_count(target) == 1
}

fn holds_branches(tree: &Tree, target: NodeId) -> bool {
    (1..=2).contains(&tree.child_count(target))
}

fn is_while(tree: &Tree, target: NodeId) -> bool {
    tree.get(target).terminal() == Some(Terminal::While)
}

fn is_for(tree: &Tree, target: NodeId) -> bool {
    tree.get(target).terminal() == Some(Terminal::For)
}

fn awaits_condition(tree: &Tree, target: NodeId) -> bool {
    is_while(tree, target) && is_empty(tree, target)
}

fn awaits_while_body(tree: &Tree, target: NodeId) -> bool {
    is_while(tree, target) && holds_one(tree, target)
}

fn awaits_counter(tree: &Tree, target: NodeId) -> bool {
    is_for(tree, target) && is_empty(tree, target)
}

/// Start and end bounds of a counting loop.
fn awaits_bound(tree: &Tree, target: NodeId) -> bool {
    is_for(tree, target) && (1..=2).contains(&tree.child_count(target))
}

fn awaits_for_body(tree: &Tree, target: NodeId) -> bool {
    is_for(tree, target) && tree.child_count(target) == 3
}

fn is_name_slot(tree: &Tree, target: NodeId) -> bool {
    is_empty(tree, target)
}

/// A function definition still collecting parameters or its body.
fn is_open_definition(tree: &Tree, target: NodeId) -> bool {
    tree.last_child(target)
        .is_some_and(|last| tree.get(last).construct != Construct::Scope)
}

use BindingKind::{MoveLeftToChild, MoveRightToChild, MoveUpwardAndLeft};
use Subject::{Expression, Is};

pub static BINDINGS: &[Binding] = &[
    // var NAME = EXPR;
    row(Is(Construct::Variable), Construct::VarDecl, MoveRightToChild, is_empty),
    row(Expression, Construct::VarDecl, MoveLeftToChild, holds_one),
    // NAME = EXPR;  NAME(ARGS);
    row(Is(Construct::VarSet), Construct::Variable, MoveUpwardAndLeft, is_name_slot),
    row(Is(Construct::FuncCall), Construct::Variable, MoveUpwardAndLeft, is_name_slot),
    row(Expression, Construct::Output, MoveLeftToChild, is_empty),
    row(Is(Construct::Variable), Construct::Input, MoveLeftToChild, is_empty),
    row(Expression, Construct::If, MoveLeftToChild, is_empty),
    row(Is(Construct::Scope), Construct::If, MoveLeftToChild, holds_branches),
    row(Expression, Construct::Loop, MoveLeftToChild, awaits_condition),
    row(Is(Construct::Scope), Construct::Loop, MoveLeftToChild, awaits_while_body),
    row(Is(Construct::Variable), Construct::Loop, MoveRightToChild, awaits_counter),
    row(Expression, Construct::Loop, MoveLeftToChild, awaits_bound),
    row(Is(Construct::Scope), Construct::Loop, MoveLeftToChild, awaits_for_body),
    row(Is(Construct::Variable), Construct::FuncDef, MoveRightToChild, is_empty),
    row(Is(Construct::Variable), Construct::FuncDef, MoveLeftToChild, is_open_definition),
    row(Is(Construct::Scope), Construct::FuncDef, MoveLeftToChild, is_open_definition),
];

/// Runs the first applicable binding for `node`, if any.
pub fn bind(tree: &mut Tree, node: NodeId) -> CompileResult<()> {
    let Some(sibling) = tree.left_sibling(node) else {
        return Ok(());
    };
    let construct = tree.get(node).construct;
    let target = tree.get(sibling).construct;
    let Some(binding) = BINDINGS.iter().find(|binding| {
        binding.sibling == target
            && binding.subject.matches(construct)
            && (binding.guard)(tree, sibling)
    }) else {
        return Ok(());
    };

    trace!(
        kind = binding.kind.name(),
        construct = construct.name(),
        target = target.name(),
        "binding"
    );
    match binding.kind {
        BindingKind::MoveRightToChild => tree.prepend_child(sibling, node),
        BindingKind::MoveLeftToChild => tree.append_child(sibling, node),
        BindingKind::MoveUpwardAndLeft => merge_upward(tree, node, sibling, binding)?,
    }
    Ok(())
}

fn merge_upward(
    tree: &mut Tree,
    node: NodeId,
    sibling: NodeId,
    binding: &Binding,
) -> CompileResult<()> {
    let improper = |detail| CompileError::ImproperBinding {
        kind: binding.kind.name(),
        construct: tree.get(node).construct.name(),
        target: tree.get(sibling).construct.name(),
        detail,
    };
    if tree.get(sibling).symbol.is_none() {
        return Err(improper("the name slot carries no symbol"));
    }
    if tree.parent(sibling).is_none() {
        return Err(improper("the name slot has no parent"));
    }

    let mut merged = tree.get(sibling).detached_copy();
    merged.construct = tree.get(node).construct;
    merged.negated ^= tree.get(node).negated;
    let merged = tree.add(merged);
    tree.insert_before(sibling, merged);

    for owner in [sibling, node] {
        let children = tree.children(owner).collect::<Vec<_>>();
        for child in children {
            tree.append_child(merged, child);
        }
        tree.detach(owner);
    }
    Ok(())
}

pub struct Optimizer<'p> {
    parse: &'p Tree,
    ast: Tree,
}

impl<'p> Optimizer<'p> {
    pub fn new(parse: &'p Tree) -> Self {
        Self {
            parse,
            ast: Tree::new(),
        }
    }

    pub fn run(mut self) -> CompileResult<Tree> {
        let Some(root) = self.parse.root() else {
            return Ok(self.ast);
        };
        let ast_root = self.ast.add(self.parse.get(root).detached_copy());
        self.ast.set_root(ast_root);
        self.crawl(root, ast_root, false)?;
        debug!(
            parse_nodes = self.parse.size(root),
            ast_nodes = self.ast.size(ast_root),
            "optimized tree"
        );
        Ok(self.ast)
    }

    fn crawl(&mut self, parse_parent: NodeId, ast_parent: NodeId, negated: bool) -> CompileResult<()> {
        let parse = self.parse;
        for child in parse.children(parse_parent) {
            let node = parse.get(child);
            match node.construct {
                Construct::Null => {}
                Construct::Pass => self.crawl(child, ast_parent, negated ^ node.negated)?,
                _ => {
                    let mut copy = node.detached_copy();
                    copy.negated ^= negated;
                    let id = self.ast.add(copy);
                    self.ast.append_child(ast_parent, id);
                    self.crawl(child, id, false)?;
                    bind(&mut self.ast, id)?;
                }
            }
        }
        Ok(())
    }
}

pub fn optimize(parse: &Tree) -> CompileResult<Tree> {
    Optimizer::new(parse).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::grammar::Nonterminal;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use crate::symbols::SymbolTable;
    use crate::token::Span;
    use crate::tree::Node;
    use indoc::indoc;

    fn ast(source: &str) -> Tree {
        let mut symbols = SymbolTable::new();
        let tokens = tokenize(source, &mut symbols).expect("tokenize");
        let parse_tree = parse(&tokens).expect("parse");
        optimize(&parse_tree).expect("optimize")
    }

    fn render(source: &str) -> String {
        let tree = ast(source);
        tree.render(tree.root().expect("root"))
    }

    #[test]
    fn folds_declarations_and_assignments() {
        assert_eq!(
            render("var x = 1 + 2; echo x;"),
            "(SCOPE (VARDECL x (ADD 1 2)) (OUTPUT x))"
        );
        assert_eq!(
            render("var s = \"a\"; s = s + \"b\";"),
            "(SCOPE (VARDECL s \"a\") (VARSET:s (ADD s \"b\")))"
        );
    }

    #[test]
    fn folds_calls_and_definitions() {
        assert_eq!(
            render("function f(a, b) { echo a; } f(1, 2 * 3); g();"),
            "(SCOPE (FUNCDEF f a b (SCOPE (OUTPUT a))) (FUNCCALL:f 1 (MUL 2 3)) FUNCCALL:g)"
        );
        assert_eq!(render("function h() { }"), "(SCOPE (FUNCDEF h SCOPE))");
    }

    #[test]
    fn folds_control_flow() {
        let source = indoc! {"
            if (x < 1) { echo 1; } else if (x < 2) { echo 2; } else { echo 3; }
            while (not done) { input done; }
            for (i = 1 to 10) { echo i; }
        "};
        assert_eq!(
            render(source),
            concat!(
                "(SCOPE ",
                "(IF (LT x 1) (SCOPE (OUTPUT 1)) ",
                "(SCOPE (IF (LT x 2) (SCOPE (OUTPUT 2)) (SCOPE (OUTPUT 3))))) ",
                "(LOOP (NOT done) (SCOPE (INPUT done))) ",
                "(LOOP i 1 10 (SCOPE (OUTPUT i))))"
            )
        );
    }

    #[test]
    fn statements_after_complete_nodes_stay_in_place() {
        assert_eq!(
            render("var a = 1; b = 2; if (a == 1) { } c = 3; while (a > 0) { } d = 4;"),
            concat!(
                "(SCOPE (VARDECL a 1) (VARSET:b 2) (IF (EQ a 1) SCOPE) (VARSET:c 3) ",
                "(LOOP (GT a 0) SCOPE) (VARSET:d 4))"
            )
        );
    }

    #[test]
    fn negation_reaches_the_node_under_the_prefix() {
        assert_eq!(render("echo -3 * -(1 + x);"), "(SCOPE (OUTPUT (MUL -3 (-ADD 1 x))))");
        assert_eq!(render("echo --3;"), "(SCOPE (OUTPUT 3))");
    }

    #[test]
    fn reoptimizing_the_ast_is_a_no_op() {
        let source = indoc! {"
            var total = 0;
            function add(a, b) { var c = a + b; echo c; }
            for (i = 1 to 3) { if (i == 2) { add(i, -i); } else { total = total + i; } }
            while (total > 0 and not false) { total = total - 1; }
            input name;
            echo \"hi \" + name;
        "};
        let first = ast(source);
        let second = optimize(&first).expect("second pass");
        let (a, b) = (first.root().expect("root"), second.root().expect("root"));
        assert!(
            first.same_shape(a, &second, b),
            "{}\n{}",
            first.render(a),
            second.render(b)
        );
    }

    #[test]
    fn merging_into_an_anonymous_slot_is_improper() {
        let mut tree = Tree::new();
        let root = tree.add(Node::rule(Nonterminal::Program, Construct::Scope, Span::default()));
        tree.set_root(root);
        let slot = tree.add(Node::rule(Nonterminal::Operand, Construct::Variable, Span::default()));
        let assign = tree.add(Node::rule(Nonterminal::Assignment, Construct::VarSet, Span::default()));
        tree.append_child(root, slot);
        tree.append_child(root, assign);

        let err = bind(&mut tree, assign).expect_err("no symbol to carry");
        assert!(matches!(err, CompileError::ImproperBinding { .. }));
        assert_eq!(err.kind(), ErrorKind::Binding);
    }
}
