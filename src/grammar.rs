//! Static grammar model.

use crate::symbols::ValueType;

/// Semantic tag attached to grammar elements and tree nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Construct {
    Scope,
    If,
    Loop,
    FuncDef,
    VarDecl,
    VarSet,
    FuncCall,
    Output,
    Input,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Integer,
    String,
    Boolean,
    Variable,
    /// Splice the node's children into its parent.
    Pass,
    /// Drop the node and its subtree.
    Null,
}

impl Construct {
    pub fn is_temporary(self) -> bool {
        matches!(self, Construct::Pass | Construct::Null)
    }

    pub fn is_operator(self) -> bool {
        matches!(
            self,
            Construct::Add
                | Construct::Sub
                | Construct::Mul
                | Construct::Div
                | Construct::And
                | Construct::Or
                | Construct::Not
                | Construct::Eq
                | Construct::Ne
                | Construct::Lt
                | Construct::Le
                | Construct::Gt
                | Construct::Ge
        )
    }

    pub fn is_leaf_value(self) -> bool {
        matches!(
            self,
            Construct::Integer | Construct::String | Construct::Boolean | Construct::Variable
        )
    }

    /// Anything that produces a value.
    pub fn is_expression(self) -> bool {
        self.is_operator() || self.is_leaf_value()
    }

    pub fn name(self) -> &'static str {
        match self {
            Construct::Scope => "SCOPE",
            Construct::If => "IF",
            Construct::Loop => "LOOP",
            Construct::FuncDef => "FUNCDEF",
            Construct::VarDecl => "VARDECL",
            Construct::VarSet => "VARSET",
            Construct::FuncCall => "FUNCCALL",
            Construct::Output => "OUTPUT",
            Construct::Input => "INPUT",
            Construct::Add => "ADD",
            Construct::Sub => "SUB",
            Construct::Mul => "MUL",
            Construct::Div => "DIV",
            Construct::And => "AND",
            Construct::Or => "OR",
            Construct::Not => "NOT",
            Construct::Eq => "EQ",
            Construct::Ne => "NE",
            Construct::Lt => "LT",
            Construct::Le => "LE",
            Construct::Gt => "GT",
            Construct::Ge => "GE",
            Construct::Integer => "INTEGER",
            Construct::String => "STRING",
            Construct::Boolean => "BOOLEAN",
            Construct::Variable => "VARIABLE",
            Construct::Pass => "PASS",
            Construct::Null => "NULL",
        }
    }

    /// Source spelling of an operator construct.
    pub fn operator_symbol(self) -> &'static str {
        match self {
            Construct::Add => "+",
            Construct::Sub => "-",
            Construct::Mul => "*",
            Construct::Div => "/",
            Construct::And => "and",
            Construct::Or => "or",
            Construct::Not => "not",
            Construct::Eq => "==",
            Construct::Ne => "!=",
            Construct::Lt => "<",
            Construct::Le => "<=",
            Construct::Gt => ">",
            Construct::Ge => ">=",
            _ => self.name(),
        }
    }
}

/// How the lexer recognises a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    Exact(&'static str),
    /// `partial` accepts every prefix of a token still being read, `full`
    /// confirms a complete token.
    Pattern {
        partial: &'static str,
        full: &'static str,
    },
    /// Synthesised by the lexer or parser, never matched from text.
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Terminal {
    Var = 0,
    Function = 1,
    If = 2,
    Else = 3,
    While = 4,
    For = 5,
    To = 6,
    Echo = 7,
    Input = 8,
    And = 9,
    Or = 10,
    Not = 11,
    True = 12,
    False = 13,
    Plus = 14,
    Minus = 15,
    Star = 16,
    Slash = 17,
    EqualEqual = 18,
    NotEqual = 19,
    LessEqual = 20,
    Less = 21,
    GreaterEqual = 22,
    Greater = 23,
    Assign = 24,
    LParen = 25,
    RParen = 26,
    LBrace = 27,
    RBrace = 28,
    Comma = 29,
    Semicolon = 30,
    Integer = 31,
    String = 32,
    Identifier = 33,
    Eof = 34,
    Epsilon = 35,
}

impl Terminal {
    /// Lexing priority order: exact spellings win ties against patterns.
    pub const ALL: [Terminal; 36] = [
        Terminal::Var,
        Terminal::Function,
        Terminal::If,
        Terminal::Else,
        Terminal::While,
        Terminal::For,
        Terminal::To,
        Terminal::Echo,
        Terminal::Input,
        Terminal::And,
        Terminal::Or,
        Terminal::Not,
        Terminal::True,
        Terminal::False,
        Terminal::Plus,
        Terminal::Minus,
        Terminal::Star,
        Terminal::Slash,
        Terminal::EqualEqual,
        Terminal::NotEqual,
        Terminal::LessEqual,
        Terminal::Less,
        Terminal::GreaterEqual,
        Terminal::Greater,
        Terminal::Assign,
        Terminal::LParen,
        Terminal::RParen,
        Terminal::LBrace,
        Terminal::RBrace,
        Terminal::Comma,
        Terminal::Semicolon,
        Terminal::Integer,
        Terminal::String,
        Terminal::Identifier,
        Terminal::Eof,
        Terminal::Epsilon,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn matcher(self) -> Matcher {
        use Matcher::{Exact, Pattern, Synthetic};
        match self {
            Terminal::Var => Exact("var"),
            Terminal::Function => Exact("function"),
            Terminal::If => Exact("if"),
            Terminal::Else => Exact("else"),
            Terminal::While => Exact("while"),
            Terminal::For => Exact("for"),
            Terminal::To => Exact("to"),
            Terminal::Echo => Exact("echo"),
            Terminal::Input => Exact("input"),
            Terminal::And => Exact("and"),
            Terminal::Or => Exact("or"),
            Terminal::Not => Exact("not"),
            Terminal::True => Exact("true"),
            Terminal::False => Exact("false"),
            Terminal::Plus => Exact("+"),
            Terminal::Minus => Exact("-"),
            Terminal::Star => Exact("*"),
            Terminal::Slash => Exact("/"),
            Terminal::EqualEqual => Exact("=="),
            Terminal::NotEqual => Exact("!="),
            Terminal::LessEqual => Exact("<="),
            Terminal::Less => Exact("<"),
            Terminal::GreaterEqual => Exact(">="),
            Terminal::Greater => Exact(">"),
            Terminal::Assign => Exact("="),
            Terminal::LParen => Exact("("),
            Terminal::RParen => Exact(")"),
            Terminal::LBrace => Exact("{"),
            Terminal::RBrace => Exact("}"),
            Terminal::Comma => Exact(","),
            Terminal::Semicolon => Exact(";"),
            Terminal::Integer => Pattern {
                partial: r"[0-9]+",
                full: r"[0-9]+",
            },
            Terminal::String => Pattern {
                partial: r#""(?:[^"\\\n]|\\.)*\\?"?"#,
                full: r#""(?:[^"\\\n]|\\.)*""#,
            },
            Terminal::Identifier => Pattern {
                partial: r"[A-Za-z_][A-Za-z0-9_]*",
                full: r"[A-Za-z_][A-Za-z0-9_]*",
            },
            Terminal::Eof | Terminal::Epsilon => Synthetic,
        }
    }

    pub fn construct(self) -> Construct {
        match self {
            Terminal::Var => Construct::VarDecl,
            Terminal::Function => Construct::FuncDef,
            Terminal::If => Construct::If,
            Terminal::While | Terminal::For => Construct::Loop,
            Terminal::Echo => Construct::Output,
            Terminal::Input => Construct::Input,
            Terminal::And => Construct::And,
            Terminal::Or => Construct::Or,
            Terminal::Not => Construct::Not,
            Terminal::True | Terminal::False => Construct::Boolean,
            Terminal::Plus => Construct::Add,
            Terminal::Minus => Construct::Sub,
            Terminal::Star => Construct::Mul,
            Terminal::Slash => Construct::Div,
            Terminal::EqualEqual => Construct::Eq,
            Terminal::NotEqual => Construct::Ne,
            Terminal::LessEqual => Construct::Le,
            Terminal::Less => Construct::Lt,
            Terminal::GreaterEqual => Construct::Ge,
            Terminal::Greater => Construct::Gt,
            Terminal::Integer => Construct::Integer,
            Terminal::String => Construct::String,
            Terminal::Identifier => Construct::Variable,
            Terminal::Else
            | Terminal::To
            | Terminal::Assign
            | Terminal::LParen
            | Terminal::RParen
            | Terminal::LBrace
            | Terminal::RBrace
            | Terminal::Comma
            | Terminal::Semicolon
            | Terminal::Eof
            | Terminal::Epsilon => Construct::Null,
        }
    }

    pub fn literal_type(self) -> Option<ValueType> {
        match self {
            Terminal::Integer => Some(ValueType::Integer),
            Terminal::String => Some(ValueType::String),
            Terminal::True | Terminal::False => Some(ValueType::Boolean),
            _ => None,
        }
    }

    pub fn describe(self) -> String {
        match self.matcher() {
            Matcher::Exact(text) => format!("'{text}'"),
            Matcher::Pattern { .. } => format!("{self:?}").to_lowercase(),
            Matcher::Synthetic => match self {
                Terminal::Eof => "end of file".to_string(),
                _ => "empty derivation".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    T(Terminal),
    N(Nonterminal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum First {
    /// Selected unconditionally.
    Any,
    Set(&'static [Terminal]),
    /// Empty derivation, validated against FOLLOW.
    Epsilon,
}

impl First {
    pub fn contains(self, terminal: Terminal) -> bool {
        match self {
            First::Any => true,
            First::Set(set) => set.contains(&terminal),
            First::Epsilon => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    pub first: First,
    pub body: &'static [Element],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Production {
    pub construct: Construct,
    pub patterns: &'static [Pattern],
    pub follow: &'static [Terminal],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LeftToRight,
    RightToLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    Unary,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecedencePattern {
    pub rank: u8,
    pub operators: &'static [Terminal],
    /// Rank re-entered for the left part (binary) or operand (unary).
    pub same: Nonterminal,
    /// Rank the span falls through to.
    pub next: Nonterminal,
    pub direction: Direction,
    pub wrapper: Wrapper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Patterns(&'static Production),
    Precedence(&'static PrecedencePattern),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Nonterminal {
    Program = 0,
    Statements = 1,
    Statement = 2,
    IdentifierTail = 3,
    Assignment = 4,
    Call = 5,
    Conditional = 6,
    ElseClause = 7,
    ElseBody = 8,
    Block = 9,
    Parameters = 10,
    ParameterTail = 11,
    Arguments = 12,
    ArgumentTail = 13,
    Expression = 14,
    Logical = 15,
    Relational = 16,
    Additive = 17,
    Multiplicative = 18,
    Unary = 19,
    Operand = 20,
    Negation = 21,
}

pub const STATEMENT_START: &[Terminal] = &[
    Terminal::Var,
    Terminal::Identifier,
    Terminal::Echo,
    Terminal::Input,
    Terminal::If,
    Terminal::While,
    Terminal::For,
    Terminal::Function,
];

pub const EXPRESSION_START: &[Terminal] = &[
    Terminal::Integer,
    Terminal::String,
    Terminal::True,
    Terminal::False,
    Terminal::Identifier,
    Terminal::LParen,
    Terminal::Not,
    Terminal::Minus,
];

/// Terminals that may appear inside an expression span.
pub const EXPRESSION_ALPHABET: &[Terminal] = &[
    Terminal::Integer,
    Terminal::String,
    Terminal::True,
    Terminal::False,
    Terminal::Identifier,
    Terminal::LParen,
    Terminal::RParen,
    Terminal::Not,
    Terminal::And,
    Terminal::Or,
    Terminal::Plus,
    Terminal::Minus,
    Terminal::Star,
    Terminal::Slash,
    Terminal::EqualEqual,
    Terminal::NotEqual,
    Terminal::LessEqual,
    Terminal::Less,
    Terminal::GreaterEqual,
    Terminal::Greater,
];

const STATEMENT_FOLLOW: &[Terminal] = &[
    Terminal::Var,
    Terminal::Identifier,
    Terminal::Echo,
    Terminal::Input,
    Terminal::If,
    Terminal::While,
    Terminal::For,
    Terminal::Function,
    Terminal::Eof,
    Terminal::RBrace,
];

const BLOCK_END: &[Terminal] = &[Terminal::Eof, Terminal::RBrace];
const LIST_END: &[Terminal] = &[Terminal::RParen];
const EXPRESSION_FOLLOW: &[Terminal] = &[
    Terminal::Semicolon,
    Terminal::RParen,
    Terminal::Comma,
    Terminal::To,
];

use Element::{N, T};

const EPSILON: Pattern = Pattern {
    first: First::Epsilon,
    body: &[],
};

static PROGRAM: Production = Production {
    construct: Construct::Scope,
    patterns: &[Pattern {
        first: First::Any,
        body: &[N(Nonterminal::Statements), T(Terminal::Eof)],
    }],
    follow: &[],
};

static STATEMENTS: Production = Production {
    construct: Construct::Pass,
    patterns: &[
        Pattern {
            first: First::Set(STATEMENT_START),
            body: &[N(Nonterminal::Statement), N(Nonterminal::Statements)],
        },
        EPSILON,
    ],
    follow: BLOCK_END,
};

static STATEMENT: Production = Production {
    construct: Construct::Pass,
    patterns: &[
        Pattern {
            first: First::Set(&[Terminal::Var]),
            body: &[
                T(Terminal::Var),
                T(Terminal::Identifier),
                T(Terminal::Assign),
                N(Nonterminal::Expression),
                T(Terminal::Semicolon),
            ],
        },
        Pattern {
            first: First::Set(&[Terminal::Identifier]),
            body: &[T(Terminal::Identifier), N(Nonterminal::IdentifierTail)],
        },
        Pattern {
            first: First::Set(&[Terminal::Echo]),
            body: &[
                T(Terminal::Echo),
                N(Nonterminal::Expression),
                T(Terminal::Semicolon),
            ],
        },
        Pattern {
            first: First::Set(&[Terminal::Input]),
            body: &[
                T(Terminal::Input),
                T(Terminal::Identifier),
                T(Terminal::Semicolon),
            ],
        },
        Pattern {
            first: First::Set(&[Terminal::If]),
            body: &[N(Nonterminal::Conditional)],
        },
        Pattern {
            first: First::Set(&[Terminal::While]),
            body: &[
                T(Terminal::While),
                T(Terminal::LParen),
                N(Nonterminal::Expression),
                T(Terminal::RParen),
                N(Nonterminal::Block),
            ],
        },
        Pattern {
            first: First::Set(&[Terminal::For]),
            body: &[
                T(Terminal::For),
                T(Terminal::LParen),
                T(Terminal::Identifier),
                T(Terminal::Assign),
                N(Nonterminal::Expression),
                T(Terminal::To),
                N(Nonterminal::Expression),
                T(Terminal::RParen),
                N(Nonterminal::Block),
            ],
        },
        Pattern {
            first: First::Set(&[Terminal::Function]),
            body: &[
                T(Terminal::Function),
                T(Terminal::Identifier),
                T(Terminal::LParen),
                N(Nonterminal::Parameters),
                T(Terminal::RParen),
                N(Nonterminal::Block),
            ],
        },
    ],
    follow: STATEMENT_FOLLOW,
};

static IDENTIFIER_TAIL: Production = Production {
    construct: Construct::Pass,
    patterns: &[
        Pattern {
            first: First::Set(&[Terminal::Assign]),
            body: &[N(Nonterminal::Assignment)],
        },
        Pattern {
            first: First::Set(&[Terminal::LParen]),
            body: &[N(Nonterminal::Call)],
        },
    ],
    follow: STATEMENT_FOLLOW,
};

static ASSIGNMENT: Production = Production {
    construct: Construct::VarSet,
    patterns: &[Pattern {
        first: First::Set(&[Terminal::Assign]),
        body: &[
            T(Terminal::Assign),
            N(Nonterminal::Expression),
            T(Terminal::Semicolon),
        ],
    }],
    follow: STATEMENT_FOLLOW,
};

static CALL: Production = Production {
    construct: Construct::FuncCall,
    patterns: &[Pattern {
        first: First::Set(&[Terminal::LParen]),
        body: &[
            T(Terminal::LParen),
            N(Nonterminal::Arguments),
            T(Terminal::RParen),
            T(Terminal::Semicolon),
        ],
    }],
    follow: STATEMENT_FOLLOW,
};

static CONDITIONAL: Production = Production {
    construct: Construct::Pass,
    patterns: &[Pattern {
        first: First::Set(&[Terminal::If]),
        body: &[
            T(Terminal::If),
            T(Terminal::LParen),
            N(Nonterminal::Expression),
            T(Terminal::RParen),
            N(Nonterminal::Block),
            N(Nonterminal::ElseClause),
        ],
    }],
    follow: STATEMENT_FOLLOW,
};

static ELSE_CLAUSE: Production = Production {
    construct: Construct::Pass,
    patterns: &[
        Pattern {
            first: First::Set(&[Terminal::Else]),
            body: &[T(Terminal::Else), N(Nonterminal::ElseBody)],
        },
        EPSILON,
    ],
    follow: STATEMENT_FOLLOW,
};

static ELSE_BODY: Production = Production {
    construct: Construct::Scope,
    patterns: &[
        Pattern {
            first: First::Set(&[Terminal::LBrace]),
            body: &[
                T(Terminal::LBrace),
                N(Nonterminal::Statements),
                T(Terminal::RBrace),
            ],
        },
        Pattern {
            first: First::Set(&[Terminal::If]),
            body: &[N(Nonterminal::Conditional)],
        },
    ],
    follow: STATEMENT_FOLLOW,
};

static BLOCK: Production = Production {
    construct: Construct::Scope,
    patterns: &[Pattern {
        first: First::Set(&[Terminal::LBrace]),
        body: &[
            T(Terminal::LBrace),
            N(Nonterminal::Statements),
            T(Terminal::RBrace),
        ],
    }],
    follow: &[
        Terminal::Else,
        Terminal::Var,
        Terminal::Identifier,
        Terminal::Echo,
        Terminal::Input,
        Terminal::If,
        Terminal::While,
        Terminal::For,
        Terminal::Function,
        Terminal::Eof,
        Terminal::RBrace,
    ],
};

static PARAMETERS: Production = Production {
    construct: Construct::Pass,
    patterns: &[
        Pattern {
            first: First::Set(&[Terminal::Identifier]),
            body: &[T(Terminal::Identifier), N(Nonterminal::ParameterTail)],
        },
        EPSILON,
    ],
    follow: LIST_END,
};

static PARAMETER_TAIL: Production = Production {
    construct: Construct::Pass,
    patterns: &[
        Pattern {
            first: First::Set(&[Terminal::Comma]),
            body: &[
                T(Terminal::Comma),
                T(Terminal::Identifier),
                N(Nonterminal::ParameterTail),
            ],
        },
        EPSILON,
    ],
    follow: LIST_END,
};

static ARGUMENTS: Production = Production {
    construct: Construct::Pass,
    patterns: &[
        Pattern {
            first: First::Set(EXPRESSION_START),
            body: &[N(Nonterminal::Expression), N(Nonterminal::ArgumentTail)],
        },
        EPSILON,
    ],
    follow: LIST_END,
};

static ARGUMENT_TAIL: Production = Production {
    construct: Construct::Pass,
    patterns: &[
        Pattern {
            first: First::Set(&[Terminal::Comma]),
            body: &[
                T(Terminal::Comma),
                N(Nonterminal::Expression),
                N(Nonterminal::ArgumentTail),
            ],
        },
        EPSILON,
    ],
    follow: LIST_END,
};

static EXPRESSION: Production = Production {
    construct: Construct::Pass,
    patterns: &[Pattern {
        first: First::Any,
        body: &[N(Nonterminal::Logical)],
    }],
    follow: EXPRESSION_FOLLOW,
};

static OPERAND: Production = Production {
    construct: Construct::Pass,
    patterns: &[
        Pattern {
            first: First::Set(&[Terminal::Integer]),
            body: &[T(Terminal::Integer)],
        },
        Pattern {
            first: First::Set(&[Terminal::String]),
            body: &[T(Terminal::String)],
        },
        Pattern {
            first: First::Set(&[Terminal::True]),
            body: &[T(Terminal::True)],
        },
        Pattern {
            first: First::Set(&[Terminal::False]),
            body: &[T(Terminal::False)],
        },
        Pattern {
            first: First::Set(&[Terminal::Identifier]),
            body: &[T(Terminal::Identifier)],
        },
        Pattern {
            first: First::Set(&[Terminal::LParen]),
            body: &[
                T(Terminal::LParen),
                N(Nonterminal::Expression),
                T(Terminal::RParen),
            ],
        },
        Pattern {
            first: First::Set(&[Terminal::Minus]),
            body: &[N(Nonterminal::Negation)],
        },
    ],
    follow: EXPRESSION_FOLLOW,
};

static NEGATION: Production = Production {
    construct: Construct::Pass,
    patterns: &[Pattern {
        first: First::Set(&[Terminal::Minus]),
        body: &[T(Terminal::Minus), N(Nonterminal::Operand)],
    }],
    follow: EXPRESSION_FOLLOW,
};

static LOGICAL: PrecedencePattern = PrecedencePattern {
    rank: 1,
    operators: &[Terminal::And, Terminal::Or],
    same: Nonterminal::Logical,
    next: Nonterminal::Relational,
    direction: Direction::RightToLeft,
    wrapper: Wrapper::Binary,
};

static RELATIONAL: PrecedencePattern = PrecedencePattern {
    rank: 2,
    operators: &[
        Terminal::EqualEqual,
        Terminal::NotEqual,
        Terminal::LessEqual,
        Terminal::Less,
        Terminal::GreaterEqual,
        Terminal::Greater,
    ],
    same: Nonterminal::Relational,
    next: Nonterminal::Additive,
    direction: Direction::RightToLeft,
    wrapper: Wrapper::Binary,
};

static ADDITIVE: PrecedencePattern = PrecedencePattern {
    rank: 3,
    operators: &[Terminal::Plus, Terminal::Minus],
    same: Nonterminal::Additive,
    next: Nonterminal::Multiplicative,
    direction: Direction::RightToLeft,
    wrapper: Wrapper::Binary,
};

static MULTIPLICATIVE: PrecedencePattern = PrecedencePattern {
    rank: 4,
    operators: &[Terminal::Star, Terminal::Slash],
    same: Nonterminal::Multiplicative,
    next: Nonterminal::Unary,
    direction: Direction::RightToLeft,
    wrapper: Wrapper::Binary,
};

static UNARY: PrecedencePattern = PrecedencePattern {
    rank: 5,
    operators: &[Terminal::Not],
    same: Nonterminal::Unary,
    next: Nonterminal::Operand,
    direction: Direction::LeftToRight,
    wrapper: Wrapper::Unary,
};

impl Nonterminal {
    pub const ALL: [Nonterminal; 22] = [
        Nonterminal::Program,
        Nonterminal::Statements,
        Nonterminal::Statement,
        Nonterminal::IdentifierTail,
        Nonterminal::Assignment,
        Nonterminal::Call,
        Nonterminal::Conditional,
        Nonterminal::ElseClause,
        Nonterminal::ElseBody,
        Nonterminal::Block,
        Nonterminal::Parameters,
        Nonterminal::ParameterTail,
        Nonterminal::Arguments,
        Nonterminal::ArgumentTail,
        Nonterminal::Expression,
        Nonterminal::Logical,
        Nonterminal::Relational,
        Nonterminal::Additive,
        Nonterminal::Multiplicative,
        Nonterminal::Unary,
        Nonterminal::Operand,
        Nonterminal::Negation,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn rule(self) -> Rule {
        match self {
            Nonterminal::Program => Rule::Patterns(&PROGRAM),
            Nonterminal::Statements => Rule::Patterns(&STATEMENTS),
            Nonterminal::Statement => Rule::Patterns(&STATEMENT),
            Nonterminal::IdentifierTail => Rule::Patterns(&IDENTIFIER_TAIL),
            Nonterminal::Assignment => Rule::Patterns(&ASSIGNMENT),
            Nonterminal::Call => Rule::Patterns(&CALL),
            Nonterminal::Conditional => Rule::Patterns(&CONDITIONAL),
            Nonterminal::ElseClause => Rule::Patterns(&ELSE_CLAUSE),
            Nonterminal::ElseBody => Rule::Patterns(&ELSE_BODY),
            Nonterminal::Block => Rule::Patterns(&BLOCK),
            Nonterminal::Parameters => Rule::Patterns(&PARAMETERS),
            Nonterminal::ParameterTail => Rule::Patterns(&PARAMETER_TAIL),
            Nonterminal::Arguments => Rule::Patterns(&ARGUMENTS),
            Nonterminal::ArgumentTail => Rule::Patterns(&ARGUMENT_TAIL),
            Nonterminal::Expression => Rule::Patterns(&EXPRESSION),
            Nonterminal::Logical => Rule::Precedence(&LOGICAL),
            Nonterminal::Relational => Rule::Precedence(&RELATIONAL),
            Nonterminal::Additive => Rule::Precedence(&ADDITIVE),
            Nonterminal::Multiplicative => Rule::Precedence(&MULTIPLICATIVE),
            Nonterminal::Unary => Rule::Precedence(&UNARY),
            Nonterminal::Operand => Rule::Patterns(&OPERAND),
            Nonterminal::Negation => Rule::Patterns(&NEGATION),
        }
    }

    pub fn construct(self) -> Construct {
        match self.rule() {
            Rule::Patterns(production) => production.construct,
            Rule::Precedence(_) => Construct::Pass,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Nonterminal::Program => "program",
            Nonterminal::Statements => "statements",
            Nonterminal::Statement => "statement",
            Nonterminal::IdentifierTail => "identifier-tail",
            Nonterminal::Assignment => "assignment",
            Nonterminal::Call => "call",
            Nonterminal::Conditional => "conditional",
            Nonterminal::ElseClause => "else-clause",
            Nonterminal::ElseBody => "else-body",
            Nonterminal::Block => "block",
            Nonterminal::Parameters => "parameters",
            Nonterminal::ParameterTail => "parameter-tail",
            Nonterminal::Arguments => "arguments",
            Nonterminal::ArgumentTail => "argument-tail",
            Nonterminal::Expression => "expression",
            Nonterminal::Logical => "logical",
            Nonterminal::Relational => "relational",
            Nonterminal::Additive => "additive",
            Nonterminal::Multiplicative => "multiplicative",
            Nonterminal::Unary => "unary",
            Nonterminal::Operand => "operand",
            Nonterminal::Negation => "negation",
        }
    }

    /// Index of the first non-empty pattern whose FIRST set holds `terminal`.
    pub fn pattern_index(self, terminal: Terminal) -> Option<usize> {
        match self.rule() {
            Rule::Patterns(production) => production
                .patterns
                .iter()
                .position(|pattern| pattern.first.contains(terminal)),
            Rule::Precedence(_) => None,
        }
    }

    pub fn has_epsilon(self) -> bool {
        match self.rule() {
            Rule::Patterns(production) => production
                .patterns
                .iter()
                .any(|pattern| pattern.first == First::Epsilon),
            Rule::Precedence(_) => false,
        }
    }

    pub fn in_follow(self, terminal: Terminal) -> bool {
        match self.rule() {
            Rule::Patterns(production) => production.follow.contains(&terminal),
            Rule::Precedence(_) => false,
        }
    }
}

/// Precedence rule for `rank` (1 binds loosest, 5 tightest).
pub fn precedence(rank: u8) -> Option<&'static PrecedencePattern> {
    [&LOGICAL, &RELATIONAL, &ADDITIVE, &MULTIPLICATIVE, &UNARY]
        .into_iter()
        .find(|pattern| pattern.rank == rank)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_nonterminal_is_either_patterns_or_precedence() {
        for nonterminal in Nonterminal::ALL {
            match nonterminal.rule() {
                Rule::Patterns(production) => assert!(
                    !production.patterns.is_empty(),
                    "{} has no patterns",
                    nonterminal.name()
                ),
                Rule::Precedence(pattern) => assert!(!pattern.operators.is_empty()),
            }
        }
    }

    #[test]
    fn first_and_follow_selection_is_total_and_unambiguous() {
        for nonterminal in Nonterminal::ALL {
            let Rule::Patterns(production) = nonterminal.rule() else {
                continue;
            };
            for terminal in Terminal::ALL {
                let matching = production
                    .patterns
                    .iter()
                    .filter(|pattern| pattern.first.contains(terminal))
                    .count();
                let empty = nonterminal.has_epsilon() && nonterminal.in_follow(terminal);
                let any = production
                    .patterns
                    .iter()
                    .any(|pattern| pattern.first == First::Any);
                assert!(
                    matching <= 1,
                    "{} selects {matching} patterns on {terminal:?}",
                    nonterminal.name()
                );
                assert!(
                    !(matching == 1 && empty && !any),
                    "{} is ambiguous between a pattern and epsilon on {terminal:?}",
                    nonterminal.name()
                );
            }
        }
    }

    #[test]
    fn precedence_ranks_chain_to_the_operand_rule() {
        let mut rank = 1;
        while let Some(pattern) = precedence(rank) {
            assert_eq!(pattern.rank, rank);
            match pattern.next.rule() {
                Rule::Precedence(next) => assert_eq!(next.rank, rank + 1),
                Rule::Patterns(_) => assert_eq!(pattern.next, Nonterminal::Operand),
            }
            rank += 1;
        }
        assert_eq!(rank, 6);
    }

    #[test]
    fn temporary_constructs_are_exactly_pass_and_null() {
        assert!(Construct::Pass.is_temporary());
        assert!(Construct::Null.is_temporary());
        assert!(!Construct::Scope.is_temporary());
        assert!(!Construct::Variable.is_temporary());
    }

    #[test]
    fn terminal_ids_follow_declaration_order() {
        for (index, terminal) in Terminal::ALL.iter().enumerate() {
            assert_eq!(terminal.id() as usize, index);
        }
        for (index, nonterminal) in Nonterminal::ALL.iter().enumerate() {
            assert_eq!(nonterminal.id() as usize, index);
        }
    }
}
