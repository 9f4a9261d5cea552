use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{character}' at line {line}, column {column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Unterminated string literal at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("Invalid integer literal '{literal}' at line {line}, column {column}")]
    InvalidIntegerLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("Invalid pattern for terminal {terminal}: {message}")]
    InvalidPattern {
        terminal: String,
        message: String,
    },
}

pub type LexResult<T> = Result<T, LexError>;
