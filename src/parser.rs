//! Table-driven recursive-descent parser.
//!
//! Ordinary rules select a pattern through their FIRST sets and expand it left
//! to right. Expressions are handled by precedence climbing over token spans:
//! an expression's extent is found up front, and each rank splits its span at
//! the first operator of that rank met in the rank's scan direction.

use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::grammar::{
    Construct, Direction, EXPRESSION_ALPHABET, Element, Nonterminal, PrecedencePattern, Rule,
    Terminal, Wrapper,
};
use crate::token::{Span, Token};
use crate::tree::{Node, NodeId, Tree};

pub struct Parser<'t> {
    tokens: &'t [Token],
    cursor: usize,
    /// Exclusive end of the span currently being parsed.
    limit: usize,
    tree: Tree,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            cursor: 0,
            limit: tokens.len(),
            tree: Tree::new(),
        }
    }

    pub fn parse_program(mut self) -> CompileResult<Tree> {
        let root = self.parse_rule(Nonterminal::Program)?;
        self.tree.set_root(root);
        debug!(nodes = self.tree.size(root), "parsed program");
        Ok(self.tree)
    }

    fn parse_rule(&mut self, rule: Nonterminal) -> CompileResult<NodeId> {
        let production = match rule.rule() {
            Rule::Patterns(production) => production,
            Rule::Precedence(pattern) => return self.parse_precedence(rule, pattern),
        };

        let lookahead = self.peek();
        let node = self
            .tree
            .add(Node::rule(rule, production.construct, self.current_span()));

        let selected = rule.pattern_index(lookahead.unwrap_or(Terminal::Eof));
        let Some(index) = selected else {
            match lookahead {
                Some(terminal) if rule.has_epsilon() && rule.in_follow(terminal) => {
                    let marker = self.tree.add(Node::empty_marker(self.current_span()));
                    self.tree.append_child(node, marker);
                    return Ok(node);
                }
                Some(terminal) => return Err(self.unexpected(rule, terminal)),
                None => return Err(self.unexpected_end(rule)),
            }
        };

        if rule == Nonterminal::Expression {
            let end = self.expression_end();
            let child = self.parse_bounded(Nonterminal::Logical, end, rule)?;
            self.tree.append_child(node, child);
            return Ok(node);
        }

        for element in production.patterns[index].body {
            let child = match *element {
                Element::T(expected) => self.expect(expected, rule)?,
                Element::N(sub) => self.parse_rule(sub)?,
            };
            self.tree.append_child(node, child);
        }

        if rule == Nonterminal::Negation {
            self.tree.get_mut(node).negated = true;
            if let Some(operator) = self.tree.first_child(node) {
                self.fold_operator(operator);
            }
        }
        Ok(node)
    }

    fn parse_precedence(
        &mut self,
        rule: Nonterminal,
        pattern: &'static PrecedencePattern,
    ) -> CompileResult<NodeId> {
        let (start, end) = (self.cursor, self.limit);
        let Some(split) = self.find_split(pattern, start, end) else {
            return self.parse_rule(pattern.next);
        };

        let operator = &self.tokens[split];
        let node = self.tree.add(Node::rule(
            rule,
            operator.terminal.construct(),
            operator.span,
        ));
        match pattern.wrapper {
            Wrapper::Binary => {
                let left = self.parse_bounded(pattern.same, split, rule)?;
                let op = self.expect(operator.terminal, rule)?;
                self.fold_operator(op);
                let right = self.parse_bounded(pattern.next, end, rule)?;
                self.tree.append_child(node, left);
                self.tree.append_child(node, op);
                self.tree.append_child(node, right);
            }
            Wrapper::Unary => {
                let op = self.expect(operator.terminal, rule)?;
                self.fold_operator(op);
                let operand = self.parse_bounded(pattern.same, end, rule)?;
                self.tree.append_child(node, op);
                self.tree.append_child(node, operand);
            }
        }
        Ok(node)
    }

    /// Parses `rule` over `[cursor, end)` and requires the whole span consumed.
    fn parse_bounded(
        &mut self,
        rule: Nonterminal,
        end: usize,
        owner: Nonterminal,
    ) -> CompileResult<NodeId> {
        let saved = self.limit;
        self.limit = end;
        let node = self.parse_rule(rule)?;
        if self.cursor != end {
            let terminal = self.tokens[self.cursor].terminal;
            return Err(self.unexpected(owner, terminal));
        }
        self.limit = saved;
        Ok(node)
    }

    fn find_split(&self, pattern: &PrecedencePattern, start: usize, end: usize) -> Option<usize> {
        let positions: Box<dyn Iterator<Item = usize>> = match pattern.direction {
            Direction::LeftToRight => Box::new(start..end),
            Direction::RightToLeft => Box::new((start..end).rev()),
        };
        let mut depth = 0i32;
        for index in positions {
            let terminal = self.tokens[index].terminal;
            match (terminal, pattern.direction) {
                (Terminal::LParen, Direction::LeftToRight)
                | (Terminal::RParen, Direction::RightToLeft) => depth += 1,
                (Terminal::RParen, Direction::LeftToRight)
                | (Terminal::LParen, Direction::RightToLeft) => depth -= 1,
                _ => {}
            }
            if depth != 0 || !pattern.operators.contains(&terminal) {
                continue;
            }
            let splits = match pattern.wrapper {
                Wrapper::Binary => index > start && ends_operand(self.tokens[index - 1].terminal),
                Wrapper::Unary => index == start,
            };
            if splits {
                return Some(index);
            }
        }
        None
    }

    /// End of the expression starting at the cursor: the first token at paren
    /// depth zero that cannot continue it.
    fn expression_end(&self) -> usize {
        let mut depth = 0usize;
        let mut index = self.cursor;
        while index < self.limit {
            let terminal = self.tokens[index].terminal;
            if !EXPRESSION_ALPHABET.contains(&terminal) {
                break;
            }
            match terminal {
                Terminal::LParen => depth += 1,
                Terminal::RParen if depth == 0 => break,
                Terminal::RParen => depth -= 1,
                _ => {}
            }
            index += 1;
        }
        index
    }

    /// Operator tokens absorbed by a wrapper carry no meaning of their own.
    fn fold_operator(&mut self, operator: NodeId) {
        self.tree.get_mut(operator).construct = Construct::Null;
    }

    fn expect(&mut self, expected: Terminal, rule: Nonterminal) -> CompileResult<NodeId> {
        let Some(found) = self.peek() else {
            return Err(self.unexpected_end(rule));
        };
        if found != expected {
            let span = self.current_span();
            return Err(CompileError::MismatchedTerminal {
                expected: expected.describe(),
                found: found.describe(),
                line: span.line,
                column: span.column,
            });
        }
        let node = self.tree.add(Node::token(&self.tokens[self.cursor]));
        self.cursor += 1;
        Ok(node)
    }

    fn peek(&self) -> Option<Terminal> {
        if self.cursor < self.limit {
            self.tokens.get(self.cursor).map(|token| token.terminal)
        } else {
            None
        }
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.cursor)
            .or_else(|| self.tokens.last())
            .map(|token| token.span)
            .unwrap_or_default()
    }

    fn unexpected(&self, rule: Nonterminal, terminal: Terminal) -> CompileError {
        let span = self.current_span();
        CompileError::UnexpectedTerminal {
            rule: rule.name(),
            found: terminal.describe(),
            line: span.line,
            column: span.column,
        }
    }

    fn unexpected_end(&self, rule: Nonterminal) -> CompileError {
        let span = self.current_span();
        CompileError::UnexpectedEnd {
            rule: rule.name(),
            line: span.line,
            column: span.column,
        }
    }
}

fn ends_operand(terminal: Terminal) -> bool {
    matches!(
        terminal,
        Terminal::Integer
            | Terminal::String
            | Terminal::True
            | Terminal::False
            | Terminal::Identifier
            | Terminal::RParen
    )
}

pub fn parse(tokens: &[Token]) -> CompileResult<Tree> {
    Parser::new(tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::symbols::SymbolTable;
    use crate::tree::Origin;

    fn parse_source(source: &str) -> CompileResult<Tree> {
        let mut symbols = SymbolTable::new();
        let tokens = tokenize(source, &mut symbols).expect("tokenize");
        parse(&tokens)
    }

    /// Renders only operator wrappers and operand leaves of an expression.
    fn shape(tree: &Tree, id: NodeId) -> String {
        let node = tree.get(id);
        let meaningful = tree
            .children(id)
            .filter(|child| tree.get(*child).construct != Construct::Null)
            .collect::<Vec<_>>();
        match node.origin {
            Origin::Token(_) => node.value.clone().unwrap_or_default(),
            Origin::Rule(_) if node.construct.is_operator() => {
                let parts = meaningful
                    .iter()
                    .map(|child| shape(tree, *child))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("({} {parts})", node.construct.operator_symbol())
            }
            Origin::Rule(_) => {
                let inner = meaningful
                    .iter()
                    .map(|child| shape(tree, *child))
                    .collect::<Vec<_>>()
                    .join(" ");
                if node.negated { format!("-{inner}") } else { inner }
            }
        }
    }

    fn expression_shape(source: &str) -> String {
        let tree = parse_source(&format!("echo {source};")).expect("parse");
        let root = tree.root().expect("root");
        // program -> statements -> statement -> [echo, expression, ;]
        let statements = tree.first_child(root).expect("statements");
        let statement = tree.first_child(statements).expect("statement");
        let expression = tree.child(statement, 1).expect("expression");
        shape(&tree, expression)
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(expression_shape("1 + 2 * 3"), "(+ 1 (* 2 3))");
        assert_eq!(expression_shape("1 * 2 + 3"), "(+ (* 1 2) 3)");
    }

    #[test]
    fn same_rank_operators_group_to_the_left() {
        assert_eq!(expression_shape("1 - 2 - 3"), "(- (- 1 2) 3)");
        assert_eq!(expression_shape("8 / 4 / 2"), "(/ (/ 8 4) 2)");
        assert_eq!(expression_shape("1 - 2 + 3"), "(+ (- 1 2) 3)");
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(expression_shape("(1 + 2) * 3"), "(* (+ 1 2) 3)");
        assert_eq!(expression_shape("1 - (2 - 3)"), "(- 1 (- 2 3))");
    }

    #[test]
    fn logical_and_comparison_ranks() {
        assert_eq!(
            expression_shape("a < 1 and not b == c"),
            "(and (< a 1) (== (not b) c))"
        );
        assert_eq!(expression_shape("not not t"), "(not (not t))");
    }

    #[test]
    fn prefix_minus_is_not_a_split_point() {
        assert_eq!(expression_shape("1 - -2"), "(- 1 -2)");
        assert_eq!(expression_shape("-x * 3"), "(* -x 3)");
    }

    #[test]
    fn epsilon_derivation_adds_a_marker() {
        let tree = parse_source("").expect("empty program parses");
        let root = tree.root().expect("root");
        let statements = tree.first_child(root).expect("statements");
        let marker = tree.first_child(statements).expect("marker");
        assert_eq!(tree.get(marker).terminal(), Some(Terminal::Epsilon));
    }

    #[test]
    fn reports_unexpected_terminal_with_rule() {
        let err = parse_source("var = 3;").expect_err("missing name");
        assert!(matches!(err, CompileError::MismatchedTerminal { .. }));
        assert!(err.to_string().contains("expected identifier"), "{err}");

        let err = parse_source("echo 1;\nelse { }").expect_err("dangling else");
        assert!(
            err.to_string().contains("<statements>") && err.to_string().contains("line 2"),
            "{err}"
        );
    }

    #[test]
    fn reports_truncated_and_overlong_expressions() {
        let err = parse_source("echo 1 +;").expect_err("missing operand");
        assert!(matches!(err, CompileError::UnexpectedEnd { .. }), "{err}");

        let err = parse_source("echo 1 2;").expect_err("two operands");
        assert!(matches!(err, CompileError::UnexpectedTerminal { .. }), "{err}");
    }
}
