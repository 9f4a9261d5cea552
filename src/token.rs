use crate::grammar::Terminal;
use crate::symbols::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

/// One lexed token: the terminal, the interned identifier (if any) and the
/// literal text (if any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub terminal: Terminal,
    pub symbol: Option<SymbolId>,
    pub text: Option<String>,
    pub span: Span,
}

impl Token {
    pub fn new(terminal: Terminal, span: Span) -> Self {
        Self {
            terminal,
            symbol: None,
            text: None,
            span,
        }
    }

    pub fn with_symbol(mut self, symbol: SymbolId) -> Self {
        self.symbol = Some(symbol);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}
