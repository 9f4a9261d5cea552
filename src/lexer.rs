//! Longest-match lexer driven by the terminal table.
//!
//! Every terminal is tried once at the current position and the longest match
//! wins; ties go to the terminal listed first, so keywords beat identifiers.

use regex::Regex;

use crate::grammar::{Matcher, Terminal};
use crate::symbols::SymbolTable;
use crate::token::{Span, Token};

mod error;

pub use error::{LexError, LexResult};

enum CompiledMatcher {
    Exact(&'static str),
    Pattern { partial: Regex, full: Regex },
}

impl CompiledMatcher {
    /// Length of the complete token at the start of `rest`.
    fn complete(&self, rest: &str) -> Option<usize> {
        match self {
            CompiledMatcher::Exact(text) => rest.starts_with(text).then_some(text.len()),
            CompiledMatcher::Pattern { full, .. } => full.find(rest).map(|m| m.end()),
        }
    }

    /// Length of the unfinished token at the start of `rest`.
    fn started(&self, rest: &str) -> usize {
        match self {
            CompiledMatcher::Exact(_) => 0,
            CompiledMatcher::Pattern { partial, .. } => partial.find(rest).map_or(0, |m| m.end()),
        }
    }
}

fn anchored(terminal: Terminal, pattern: &str) -> LexResult<Regex> {
    Regex::new(&format!("^(?:{pattern})")).map_err(|err| LexError::InvalidPattern {
        terminal: format!("{terminal:?}"),
        message: err.to_string(),
    })
}

pub struct Lexer<'a> {
    input: &'a str,
    matchers: Vec<(Terminal, CompiledMatcher)>,
    position: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> LexResult<Self> {
        let mut matchers = Vec::new();
        for terminal in Terminal::ALL {
            let matcher = match terminal.matcher() {
                Matcher::Exact(text) => CompiledMatcher::Exact(text),
                Matcher::Pattern { partial, full } => CompiledMatcher::Pattern {
                    partial: anchored(terminal, partial)?,
                    full: anchored(terminal, full)?,
                },
                Matcher::Synthetic => continue,
            };
            matchers.push((terminal, matcher));
        }
        Ok(Self {
            input,
            matchers,
            position: 0,
            line: 1,
            column: 1,
        })
    }

    pub fn next_token(&mut self, symbols: &mut SymbolTable) -> LexResult<Token> {
        self.skip_trivia();

        let start = self.position;
        let (line, column) = (self.line, self.column);
        let rest = &self.input[start..];
        if rest.is_empty() {
            return Ok(Token::new(
                Terminal::Eof,
                Span {
                    start,
                    end: start,
                    line,
                    column,
                },
            ));
        }

        let mut best: Option<(usize, Terminal)> = None;
        for (terminal, matcher) in &self.matchers {
            if let Some(len) = matcher.complete(rest)
                && len > 0
                && best.is_none_or(|(longest, _)| len > longest)
            {
                best = Some((len, *terminal));
            }
        }

        let Some((len, terminal)) = best else {
            let unfinished = self
                .matchers
                .iter()
                .map(|(terminal, matcher)| (matcher.started(rest), *terminal))
                .max_by_key(|(len, _)| *len);
            if let Some((len, Terminal::String)) = unfinished
                && len > 0
            {
                return Err(LexError::UnterminatedString { line, column });
            }
            let character = rest.chars().next().unwrap_or('\0');
            return Err(LexError::UnexpectedCharacter {
                character,
                line,
                column,
            });
        };

        let lexeme = &rest[..len];
        self.advance(len);
        let span = Span {
            start,
            end: start + len,
            line,
            column,
        };
        let token = Token::new(terminal, span);
        let token = match terminal {
            Terminal::Identifier => token.with_symbol(symbols.intern(lexeme)).with_text(lexeme),
            Terminal::Integer => {
                lexeme
                    .parse::<i64>()
                    .map_err(|_| LexError::InvalidIntegerLiteral {
                        literal: lexeme.to_string(),
                        line,
                        column,
                    })?;
                token.with_text(lexeme)
            }
            // Escape sequences are kept verbatim for the backends to re-emit.
            Terminal::String => token.with_text(&lexeme[1..lexeme.len() - 1]),
            Terminal::True | Terminal::False => token.with_text(lexeme),
            _ => token,
        };
        Ok(token)
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = &self.input[self.position..];
            let Some(ch) = rest.chars().next() else {
                return;
            };
            if ch.is_whitespace() {
                self.advance(ch.len_utf8());
            } else if ch == '#' {
                let len = rest.find('\n').unwrap_or(rest.len());
                self.advance(len);
            } else {
                return;
            }
        }
    }

    fn advance(&mut self, len: usize) {
        for ch in self.input[self.position..self.position + len].chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.position += len;
    }
}

/// Tokenizes `input`, interning identifiers into `symbols`. The returned
/// stream always ends with an end-of-file token.
pub fn tokenize(input: &str, symbols: &mut SymbolTable) -> LexResult<Vec<Token>> {
    let mut lexer = Lexer::new(input)?;
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token(symbols)?;
        let is_eof = token.terminal == Terminal::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn terminals(input: &str) -> Vec<Terminal> {
        let mut symbols = SymbolTable::new();
        tokenize(input, &mut symbols)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.terminal)
            .collect()
    }

    #[test]
    fn test_simple_program() {
        let input = indoc! {"
            var x = 1 + 2;
            echo x;
        "};
        assert_eq!(
            terminals(input),
            vec![
                Terminal::Var,
                Terminal::Identifier,
                Terminal::Assign,
                Terminal::Integer,
                Terminal::Plus,
                Terminal::Integer,
                Terminal::Semicolon,
                Terminal::Echo,
                Terminal::Identifier,
                Terminal::Semicolon,
                Terminal::Eof,
            ]
        );
    }

    #[test]
    fn prefers_longest_match_and_keywords() {
        assert_eq!(
            terminals("iffy if <= < == = != forty for"),
            vec![
                Terminal::Identifier,
                Terminal::If,
                Terminal::LessEqual,
                Terminal::Less,
                Terminal::EqualEqual,
                Terminal::Assign,
                Terminal::NotEqual,
                Terminal::Identifier,
                Terminal::For,
                Terminal::Eof,
            ]
        );
    }

    #[test]
    fn keeps_string_escapes_verbatim() {
        let mut symbols = SymbolTable::new();
        let tokens = tokenize(r#"echo "a\nb" + "q\"uote";"#, &mut symbols).expect("tokenize");
        assert_eq!(tokens[1].text.as_deref(), Some(r"a\nb"));
        assert_eq!(tokens[3].text.as_deref(), Some(r#"q\"uote"#));
    }

    #[test]
    fn lexes_long_tokens_in_one_match() {
        let name = "n".repeat(20_000);
        let text = "x".repeat(20_000);
        let mut symbols = SymbolTable::new();
        let tokens = tokenize(&format!("var {name} = \"{text}\";"), &mut symbols).expect("tokenize");
        assert_eq!(tokens[1].text.as_deref(), Some(name.as_str()));
        assert_eq!(tokens[3].text.as_deref(), Some(text.as_str()));
        assert_eq!(tokens[4].span.column, 20_000 + 20_000 + 10);
    }

    #[test]
    fn interns_identifiers_and_tracks_positions() {
        let mut symbols = SymbolTable::new();
        let tokens = tokenize("x = 1;\n  x = 2; # trailing\n", &mut symbols).expect("tokenize");
        assert_eq!(tokens[0].symbol, tokens[4].symbol);
        assert_eq!(symbols.len(), 1);
        assert_eq!((tokens[4].span.line, tokens[4].span.column), (2, 3));
    }

    #[test]
    fn errors_on_invalid_character() {
        let mut symbols = SymbolTable::new();
        let err = tokenize("var x = 1 @ 2;", &mut symbols).expect_err("expected lexing failure");
        assert!(err.to_string().contains("Unexpected character '@'"));
    }

    #[test]
    fn errors_on_unterminated_string() {
        let mut symbols = SymbolTable::new();
        let err = tokenize("echo \"abc\n", &mut symbols).expect_err("expected lexing failure");
        assert!(matches!(err, LexError::UnterminatedString { .. }));
    }

    #[test]
    fn errors_on_integer_overflow() {
        let mut symbols = SymbolTable::new();
        let err = tokenize("var n = 99999999999999999999999999;", &mut symbols)
            .expect_err("expected overflow");
        assert!(err.to_string().contains("Invalid integer literal"));
    }
}
