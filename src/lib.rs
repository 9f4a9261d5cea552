//! `scriptc`: a grammar-table driven compiler for a small imperative
//! scripting language.

use clap::ValueEnum;
use tracing::debug;

pub mod backend;
pub mod codegen;
pub mod error;
pub mod grammar;
pub mod lexer;
pub mod logging;
pub mod optimizer;
pub mod parser;
pub mod symbols;
pub mod token;
pub mod tree;
pub mod typeck;
pub mod vm;

use backend::Backend;
use backend::asm::Asm;
use backend::mips::Mips;
use backend::python::Python;
pub use error::{CompileError, CompileResult, ErrorKind};
use symbols::SymbolTable;
use tree::Tree;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Asm,
    Mips,
    Python,
}

impl Target {
    pub fn backend(self) -> &'static dyn Backend {
        match self {
            Target::Asm => &Asm,
            Target::Mips => &Mips,
            Target::Python => &Python,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub target: Target,
    /// Overrides the target's register count.
    pub registers: Option<usize>,
}

/// A type-checked program, ready for code generation.
#[derive(Debug, Clone)]
pub struct Checked {
    pub ast: Tree,
    pub symbols: SymbolTable,
}

/// Runs every pass up to and including the type checker.
pub fn check(source: &str) -> CompileResult<Checked> {
    let mut symbols = SymbolTable::new();
    let tokens = lexer::tokenize(source, &mut symbols)?;
    debug!(tokens = tokens.len(), "lexed source");
    let parse = parser::parse(&tokens)?;
    let mut ast = optimizer::optimize(&parse)?;
    debug!(
        parse_nodes = parse.root().map_or(0, |root| parse.size(root)),
        ast_nodes = ast.root().map_or(0, |root| ast.size(root)),
        "optimized parse tree"
    );
    typeck::check(&mut ast, &mut symbols)?;
    debug!(symbols = symbols.len(), "type checked");
    Ok(Checked { ast, symbols })
}

pub fn compile(source: &str, options: &CompileOptions) -> CompileResult<String> {
    let Checked { ast, mut symbols } = check(source)?;
    codegen::generate(options.target.backend(), &ast, &mut symbols, options.registers)
}
