use crate::symbols::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableId(pub usize);

/// A value tracked by code generation. Named variables are write-through:
/// their stack slot always holds the value and `register` is only a cache.
/// Temporaries live in exactly one of `register` and `slot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub kind: VariableKind,
    pub register: Option<usize>,
    pub slot: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Named(SymbolId),
    /// Compiler-introduced slot, such as a counting loop's upper bound.
    Hidden(usize),
    Temp,
}

impl Variable {
    pub fn new(kind: VariableKind) -> Self {
        Self {
            kind,
            register: None,
            slot: None,
        }
    }

    pub fn is_temp(&self) -> bool {
        self.kind == VariableKind::Temp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// Home slot of a named or hidden variable.
    Named(VariableId),
    /// A temporary pushed out of its register.
    Spilled(VariableId),
    /// Register contents saved across a call.
    Saved(usize),
    Argument,
    /// Return address pushed by the call.
    Return,
    /// Reloaded spill waiting to be popped.
    Dead,
}

#[derive(Debug, Default)]
struct Level {
    base: usize,
    names: Vec<(SymbolId, VariableId)>,
}

#[derive(Debug)]
pub struct Scope {
    entries: Vec<Entry>,
    levels: Vec<Level>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            levels: vec![Level::default()],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: Entry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn pop(&mut self) -> Option<Entry> {
        self.entries.pop()
    }

    /// Words between the stack pointer and the slot at `index`.
    pub fn offset(&self, index: usize) -> usize {
        self.entries.len() - index - 1
    }

    pub fn mark_dead(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            *entry = Entry::Dead;
        }
    }

    /// Pops dead entries off the top, returning how many went.
    pub fn release_dead(&mut self) -> usize {
        let mut released = 0;
        while self.entries.last() == Some(&Entry::Dead) {
            self.entries.pop();
            released += 1;
        }
        released
    }

    pub fn bind(&mut self, symbol: SymbolId, variable: VariableId) {
        if let Some(level) = self.levels.last_mut() {
            level.names.push((symbol, variable));
        }
    }

    /// Innermost binding of `symbol`; later declarations shadow earlier ones.
    pub fn resolve(&self, symbol: SymbolId) -> Option<VariableId> {
        self.levels.iter().rev().find_map(|level| {
            level
                .names
                .iter()
                .rev()
                .find(|(name, _)| *name == symbol)
                .map(|(_, variable)| *variable)
        })
    }

    pub fn enter(&mut self) {
        self.levels.push(Level {
            base: self.entries.len(),
            names: Vec::new(),
        });
    }

    /// Closes the innermost level. Returns the variables it declared and the
    /// number of stack entries to release.
    pub fn leave(&mut self) -> (Vec<VariableId>, usize) {
        let Some(level) = self.levels.pop() else {
            return (Vec::new(), 0);
        };
        let released = self.entries.len().saturating_sub(level.base);
        self.entries.truncate(level.base);
        let variables = level.names.into_iter().map(|(_, var)| var).collect();
        (variables, released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_count_from_the_top() {
        let mut scope = Scope::new();
        let a = scope.push(Entry::Named(VariableId(0)));
        let b = scope.push(Entry::Argument);
        scope.push(Entry::Return);
        assert_eq!(scope.offset(a), 2);
        assert_eq!(scope.offset(b), 1);
    }

    #[test]
    fn inner_levels_shadow_and_release() {
        let mut scope = Scope::new();
        let x = SymbolId(0);
        scope.push(Entry::Named(VariableId(0)));
        scope.bind(x, VariableId(0));

        scope.enter();
        scope.push(Entry::Named(VariableId(1)));
        scope.bind(x, VariableId(1));
        assert_eq!(scope.resolve(x), Some(VariableId(1)));

        let (variables, released) = scope.leave();
        assert_eq!(variables, vec![VariableId(1)]);
        assert_eq!(released, 1);
        assert_eq!(scope.resolve(x), Some(VariableId(0)));
        assert_eq!(scope.resolve(SymbolId(7)), None);
    }

    #[test]
    fn only_dead_entries_on_top_are_released() {
        let mut scope = Scope::new();
        let first = scope.push(Entry::Spilled(VariableId(0)));
        let second = scope.push(Entry::Spilled(VariableId(1)));
        scope.mark_dead(first);
        assert_eq!(scope.release_dead(), 0);
        scope.mark_dead(second);
        assert_eq!(scope.release_dead(), 2);
        assert!(scope.is_empty());
    }
}
