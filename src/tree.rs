use crate::grammar::{Construct, Nonterminal, Terminal};
use crate::symbols::{SymbolId, ValueType};
use crate::token::{Span, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Rule(Nonterminal),
    Token(Terminal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub construct: Construct,
    pub origin: Origin,
    pub symbol: Option<SymbolId>,
    pub value: Option<String>,
    pub negated: bool,
    pub ty: Option<ValueType>,
    pub span: Span,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl Node {
    pub fn rule(rule: Nonterminal, construct: Construct, span: Span) -> Self {
        Self::with_origin(Origin::Rule(rule), construct, span)
    }

    pub fn token(token: &Token) -> Self {
        let mut node = Self::with_origin(
            Origin::Token(token.terminal),
            token.terminal.construct(),
            token.span,
        );
        node.symbol = token.symbol;
        node.value = token.text.clone();
        node
    }

    pub fn empty_marker(span: Span) -> Self {
        Self::with_origin(Origin::Token(Terminal::Epsilon), Construct::Null, span)
    }

    /// Copies everything except tree links.
    pub fn detached_copy(&self) -> Self {
        let mut node = Self::with_origin(self.origin, self.construct, self.span);
        node.symbol = self.symbol;
        node.value = self.value.clone();
        node.negated = self.negated;
        node.ty = self.ty;
        node
    }

    fn with_origin(origin: Origin, construct: Construct, span: Span) -> Self {
        Self {
            construct,
            origin,
            symbol: None,
            value: None,
            negated: false,
            ty: None,
            span,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }

    pub fn terminal(&self) -> Option<Terminal> {
        match self.origin {
            Origin::Token(terminal) => Some(terminal),
            Origin::Rule(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).last_child
    }

    pub fn left_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).prev_sibling
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(id).first_child,
        }
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).nth(index)
    }

    /// Number of nodes in the subtree rooted at `id` (1 for a leaf).
    pub fn size(&self, id: NodeId) -> usize {
        1 + self
            .children(id)
            .map(|child| self.size(child))
            .sum::<usize>()
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let last = self.get(parent).last_child;
        {
            let node = self.get_mut(child);
            node.parent = Some(parent);
            node.prev_sibling = last;
            node.next_sibling = None;
        }
        match last {
            Some(last) => self.get_mut(last).next_sibling = Some(child),
            None => self.get_mut(parent).first_child = Some(child),
        }
        self.get_mut(parent).last_child = Some(child);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let first = self.get(parent).first_child;
        {
            let node = self.get_mut(child);
            node.parent = Some(parent);
            node.prev_sibling = None;
            node.next_sibling = first;
        }
        match first {
            Some(first) => self.get_mut(first).prev_sibling = Some(child),
            None => self.get_mut(parent).last_child = Some(child),
        }
        self.get_mut(parent).first_child = Some(child);
    }

    /// Inserts `node` into the sibling list directly before `anchor`.
    pub fn insert_before(&mut self, anchor: NodeId, node: NodeId) {
        self.detach(node);
        let parent = self.get(anchor).parent;
        let prev = self.get(anchor).prev_sibling;
        {
            let inserted = self.get_mut(node);
            inserted.parent = parent;
            inserted.prev_sibling = prev;
            inserted.next_sibling = Some(anchor);
        }
        self.get_mut(anchor).prev_sibling = Some(node);
        match prev {
            Some(prev) => self.get_mut(prev).next_sibling = Some(node),
            None => {
                if let Some(parent) = parent {
                    self.get_mut(parent).first_child = Some(node);
                }
            }
        }
    }

    /// Unlinks `id` from its parent and siblings; its own subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let node = self.get(id);
            (node.parent, node.prev_sibling, node.next_sibling)
        };
        match prev {
            Some(prev) => self.get_mut(prev).next_sibling = next,
            None => {
                if let Some(parent) = parent {
                    self.get_mut(parent).first_child = next;
                }
            }
        }
        match next {
            Some(next) => self.get_mut(next).prev_sibling = prev,
            None => {
                if let Some(parent) = parent {
                    self.get_mut(parent).last_child = prev;
                }
            }
        }
        let node = self.get_mut(id);
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    /// Structural equality of two subtrees, ignoring spans and arena layout.
    pub fn same_shape(&self, id: NodeId, other: &Tree, other_id: NodeId) -> bool {
        let (a, b) = (self.get(id), other.get(other_id));
        if a.construct != b.construct
            || a.origin != b.origin
            || a.symbol != b.symbol
            || a.value != b.value
            || a.negated != b.negated
            || a.ty != b.ty
        {
            return false;
        }
        let mut left = self.children(id);
        let mut right = other.children(other_id);
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(l), Some(r)) if self.same_shape(l, other, r) => {}
                _ => return false,
            }
        }
    }

    /// Compact s-expression rendering, used by diagnostics and tests.
    pub fn render(&self, id: NodeId) -> String {
        let node = self.get(id);
        let mut label = match (&node.value, node.construct) {
            (Some(value), Construct::String) => format!("\"{value}\""),
            (Some(value), construct) if construct.is_leaf_value() => value.clone(),
            (Some(value), _) => format!("{}:{value}", node.construct.name()),
            (None, construct) => construct.name().to_string(),
        };
        if node.negated {
            label.insert(0, '-');
        }
        if node.first_child.is_none() {
            return label;
        }
        let children = self
            .children(id)
            .map(|child| self.render(child))
            .collect::<Vec<_>>()
            .join(" ");
        format!("({label} {children})")
    }
}

pub struct Children<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.get(current).next_sibling;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(tree: &mut Tree, construct: Construct) -> NodeId {
        tree.add(Node::rule(Nonterminal::Operand, construct, Span::default()))
    }

    #[test]
    fn detach_and_reattach_keep_links_consistent() {
        let mut tree = Tree::new();
        let parent = leaf(&mut tree, Construct::Scope);
        let a = leaf(&mut tree, Construct::Integer);
        let b = leaf(&mut tree, Construct::String);
        let c = leaf(&mut tree, Construct::Boolean);
        tree.append_child(parent, a);
        tree.append_child(parent, b);
        tree.append_child(parent, c);

        tree.detach(b);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(tree.left_sibling(c), Some(a));

        tree.prepend_child(parent, b);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), vec![b, a, c]);

        tree.detach(c);
        assert_eq!(tree.last_child(parent), Some(a));
        tree.insert_before(b, c);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), vec![c, b, a]);
        assert_eq!(tree.first_child(parent), Some(c));
        assert_eq!(tree.parent(c), Some(parent));
        assert_eq!(tree.size(parent), 4);
        assert_eq!(tree.size(a), 1);
    }
}
