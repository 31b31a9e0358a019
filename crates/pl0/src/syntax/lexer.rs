//! Lexer implementation.

use logos::Logos;

#[derive(Debug, Copy, Clone, Logos, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token<'input> {
    #[token("->")]
    Arrow,

    #[token("|")]
    VertBar,

    #[token(";")]
    Semicolon,

    #[token("@start")]
    KwStart,

    #[token("@inherit")]
    KwInherit,

    #[token("@empty")]
    #[token("ε")]
    Empty,

    #[regex(r"\{[0-9]+\}", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].parse::<u16>().ok()
    })]
    Action(u16),

    #[regex(r"[^\s;|{}]+")]
    Ident(&'input str),
}

impl<'input> Token<'input> {
    pub fn describe(&self) -> String {
        match self {
            Self::Arrow => "`->'".into(),
            Self::VertBar => "`|'".into(),
            Self::Semicolon => "`;'".into(),
            Self::KwStart => "`@start'".into(),
            Self::KwInherit => "`@inherit'".into(),
            Self::Empty => "`ε'".into(),
            Self::Action(n) => format!("action {{{}}}", n),
            Self::Ident(s) => format!("symbol `{}'", s),
        }
    }
}

/// A token together with the line where it appears.
pub type Spanned<'input> = (usize, Token<'input>);

/// Tokenize the whole source.
pub fn tokenize(source: &str) -> anyhow::Result<Vec<Spanned<'_>>> {
    let mut lexer = Token::lexer(source);
    let mut tokens = vec![];
    while let Some(res) = lexer.next() {
        let line = source[..lexer.span().start].matches('\n').count() + 1;
        match res {
            Ok(token) => tokens.push((line, token)),
            Err(()) => anyhow::bail!("line {}: unexpected character(s) `{}'", line, lexer.slice()),
        }
    }
    Ok(tokens)
}
