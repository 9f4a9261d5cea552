use std::fmt;

use rustc_hash::FxHashMap;

use crate::tree::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    String,
    Boolean,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Integer => "integer",
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// Renders an optional type, spelling the unknown type out for diagnostics.
pub fn describe(ty: Option<ValueType>) -> String {
    ty.map_or_else(|| "unknown".to_string(), |ty| ty.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub ty: Option<ValueType>,
    pub is_function: bool,
    pub params: Vec<Option<ValueType>>,
    /// Function body stashed for deferred emission.
    pub definition: Option<NodeId>,
}

impl Symbol {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: None,
            is_function: false,
            params: Vec::new(),
            definition: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    index: FxHashMap<String, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(id) = self.index.get(name) {
            return *id;
        }
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol::new(name));
        self.index.insert(name.to_string(), id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    pub fn name(&self, id: SymbolId) -> &str {
        &self.get(id).name
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_returns_the_same_id_for_the_same_name() {
        let mut table = SymbolTable::new();
        let first = table.intern("x");
        let other = table.intern("y");
        assert_eq!(table.intern("x"), first);
        assert_ne!(first, other);
        assert_eq!(table.lookup("y"), Some(other));
        assert_eq!(table.len(), 2);
    }
}
