//! Lexical analysis of PL/0 source text.

use crate::types::Map;
use logos::Logos;
use std::{fmt, fs, io, path::Path};

/// The reserved words of PL/0, in lower case.
static KEYWORDS: phf::Set<&'static str> = phf::phf_set! {
    "const", "var", "procedure", "begin", "end", "if", "then",
    "while", "do", "call", "odd", "write", "read",
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Number,
    Operator,
    Delimiter,
    Invalid,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Keyword => "keyword",
            Self::Identifier => "identifier",
            Self::Number => "number",
            Self::Operator => "operator",
            Self::Delimiter => "delimiter",
            Self::Invalid => "invalid",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Copy, Clone, Logos, PartialEq)]
#[logos(skip r"[ \t\r\n\f\v]+")]
#[logos(skip r"\{[^}]*\}?")]
enum RawToken {
    #[regex(r"[A-Za-z][A-Za-z0-9]*")]
    Word,

    #[regex(r"[0-9]+")]
    Number,

    // A number immediately followed by letters.
    #[regex(r"[0-9]+[A-Za-z][A-Za-z0-9]*")]
    MalformedNumber,

    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("=")]
    #[token("#")]
    #[token("<")]
    #[token("<=")]
    #[token(">")]
    #[token(">=")]
    #[token(":=")]
    Operator,

    #[token(":")]
    LoneColon,

    #[token("(")]
    #[token(")")]
    #[token(",")]
    #[token(";")]
    #[token(".")]
    Delimiter,
}

/// Split the source text into tokens.
///
/// Lexical errors do not stop the scan: they are reported and produced as
/// tokens of [`TokenKind::Invalid`].
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = RawToken::lexer(source);
    let mut tokens = vec![];
    let mut line = 1;
    let mut scanned = 0;

    while let Some(res) = lexer.next() {
        let span = lexer.span();
        line += source[scanned..span.start].matches('\n').count();
        scanned = span.start;
        let text = lexer.slice();

        let token = match res {
            Ok(RawToken::Word) => {
                let word = text.to_lowercase();
                if KEYWORDS.contains(word.as_str()) {
                    Token::new(TokenKind::Keyword, word, line)
                } else {
                    Token::new(TokenKind::Identifier, word, line)
                }
            }
            Ok(RawToken::Number) => Token::new(TokenKind::Number, text, line),
            Ok(RawToken::Operator) => Token::new(TokenKind::Operator, text, line),
            Ok(RawToken::Delimiter) => Token::new(TokenKind::Delimiter, text, line),
            Ok(RawToken::MalformedNumber) => {
                tracing::error!("line {}: Invalid identifier `{}'", line, text);
                Token::new(TokenKind::Invalid, text, line)
            }
            Ok(RawToken::LoneColon) => {
                tracing::error!("line {}: Invalid operator `{}'", line, text);
                Token::new(TokenKind::Invalid, text, line)
            }
            Err(()) => {
                tracing::error!("line {}: Unknown symbol `{}'", line, text);
                Token::new(TokenKind::Invalid, text, line)
            }
        };
        tracing::trace!("{:?}", token);
        tokens.push(token);
    }

    tokens
}

pub fn tokenize_file(path: impl AsRef<Path>) -> io::Result<Vec<Token>> {
    let source = fs::read_to_string(path)?;
    Ok(tokenize(&source))
}

/// Count the occurrences of each identifier, in order of first appearance.
pub fn count_identifiers(tokens: &[Token]) -> Map<&str, usize> {
    let mut counts = Map::default();
    for token in tokens.iter().filter(|t| t.kind == TokenKind::Identifier) {
        *counts.entry(token.text.as_str()).or_insert(0) += 1;
    }
    counts
}
