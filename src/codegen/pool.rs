use rustc_hash::FxHashMap;

use crate::grammar::Construct;
use crate::tree::{NodeId, Tree};

/// Global string literals, named `str0`, `str1`, ... in discovery order.
#[derive(Debug, Default)]
pub struct StringPool {
    entries: Vec<(String, String)>,
    index: FxHashMap<String, usize>,
}

impl StringPool {
    /// Collects every string literal of the tree in depth-first order.
    pub fn collect(tree: &Tree) -> Self {
        let mut pool = Self::default();
        if let Some(root) = tree.root() {
            pool.visit(tree, root);
        }
        pool
    }

    fn visit(&mut self, tree: &Tree, id: NodeId) {
        let node = tree.get(id);
        if node.construct == Construct::String
            && let Some(value) = &node.value
        {
            self.intern(value);
        }
        for child in tree.children(id) {
            self.visit(tree, child);
        }
    }

    pub fn intern(&mut self, value: &str) -> &str {
        let next = self.entries.len();
        let index = *self.index.entry(value.to_string()).or_insert(next);
        if index == next {
            self.entries.push((format!("str{index}"), value.to_string()));
        }
        &self.entries[index].0
    }

    pub fn label(&self, value: &str) -> Option<&str> {
        self.index
            .get(value)
            .map(|index| self.entries[*index].0.as_str())
    }

    /// `(label, literal)` pairs; literals keep their escape sequences.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(label, value)| (label.as_str(), value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_deduplicated_in_discovery_order() {
        let mut pool = StringPool::default();
        assert_eq!(pool.intern("b"), "str0");
        assert_eq!(pool.intern(r"a\n"), "str1");
        assert_eq!(pool.intern("b"), "str0");
        assert_eq!(pool.label(r"a\n"), Some("str1"));
        assert_eq!(pool.label("missing"), None);
        assert_eq!(
            pool.entries().collect::<Vec<_>>(),
            vec![("str0", "b"), ("str1", r"a\n")]
        );
    }
}
