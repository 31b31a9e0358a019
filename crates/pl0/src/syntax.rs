//! Syntax support for the textual grammar notation.
//!
//! ```text
//! @start S;
//! @inherit E'' T';
//! E'' -> + T {6} E'' {7} | - T {8} E'' {9} | ε {10};
//! ```

pub mod ast;
pub mod lexer;

use self::lexer::{Spanned, Token};
use std::iter::Peekable;

pub fn parse(source: &str) -> anyhow::Result<ast::Grammar> {
    let span = tracing::trace_span!("parse");
    let _entered = span.enter();

    let tokens = lexer::tokenize(source)?;
    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
        last_line: 1,
    };

    let mut stmts = vec![];
    while parser.tokens.peek().is_some() {
        let stmt = parser.stmt()?;
        tracing::trace!("parsed: {:?}", stmt);
        stmts.push(stmt);
    }

    Ok(ast::Grammar { stmts })
}

struct Parser<'input, I: Iterator<Item = Spanned<'input>>> {
    tokens: Peekable<I>,
    last_line: usize,
}

impl<'input, I> Parser<'input, I>
where
    I: Iterator<Item = Spanned<'input>>,
{
    fn next(&mut self) -> Option<Token<'input>> {
        let (line, token) = self.tokens.next()?;
        self.last_line = line;
        Some(token)
    }

    fn peek(&mut self) -> Option<Token<'input>> {
        self.tokens.peek().map(|(_, t)| *t)
    }

    fn unexpected<T>(&self, expected: &str, found: Option<Token<'_>>) -> anyhow::Result<T> {
        match found {
            Some(found) => anyhow::bail!(
                "line {}: expected {}, but found {}",
                self.last_line,
                expected,
                found.describe()
            ),
            None => anyhow::bail!(
                "line {}: expected {}, but reached the end of input",
                self.last_line,
                expected
            ),
        }
    }

    fn ident(&mut self) -> anyhow::Result<String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name.to_owned()),
            found => self.unexpected("a symbol", found),
        }
    }

    fn expect(&mut self, expected: Token<'static>) -> anyhow::Result<()> {
        match self.next() {
            Some(found) if found == expected => Ok(()),
            found => self.unexpected(&expected.describe(), found),
        }
    }

    fn stmt(&mut self) -> anyhow::Result<ast::Stmt> {
        match self.peek() {
            Some(Token::KwStart) => {
                self.next();
                let name = self.ident()?;
                self.expect(Token::Semicolon)?;
                Ok(ast::Stmt::StartDesc(ast::StartDesc { name }))
            }

            Some(Token::KwInherit) => {
                self.next();
                let mut idents = vec![self.ident()?];
                while let Some(Token::Ident(..)) = self.peek() {
                    idents.push(self.ident()?);
                }
                self.expect(Token::Semicolon)?;
                Ok(ast::Stmt::InheritDesc(ast::InheritDesc { idents }))
            }

            Some(Token::Ident(..)) => {
                let left = self.ident()?;
                self.expect(Token::Arrow)?;
                let mut productions = vec![self.production()];
                loop {
                    match self.next() {
                        Some(Token::VertBar) => productions.push(self.production()),
                        Some(Token::Semicolon) => break,
                        found => return self.unexpected("`|' or `;'", found),
                    }
                }
                Ok(ast::Stmt::RuleDesc(ast::RuleDesc { left, productions }))
            }

            found => self.unexpected("a statement", found),
        }
    }

    fn production(&mut self) -> ast::Production {
        let mut elems = vec![];
        loop {
            let elem = match self.peek() {
                Some(Token::Ident(name)) => ast::ProductionElem::Ident(name.to_owned()),
                Some(Token::Action(n)) => ast::ProductionElem::Action(n),
                Some(Token::Empty) => ast::ProductionElem::Empty,
                _ => break,
            };
            self.next();
            elems.push(elem);
        }
        ast::Production { elems }
    }
}
