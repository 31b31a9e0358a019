//! Recursive-descent recognizer of PL/0 expressions.
//!
//! ```text
//! <Exp>    ::= [<AddOp>] <Term> { <AddOp> <Term> }
//! <Term>   ::= <Factor> { <MulOp> <Factor> }
//! <Factor> ::= <Identifier> | <Number> | '(' <Exp> ')'
//! ```

use crate::lexer::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("Syntax error! Expecting end of expression, but got '{found}' instead.")]
    TrailingInput { found: String, line: usize },

    #[error("Syntax error! Expecting ')' after expression, but got '{found}' instead.")]
    UnclosedParen { found: String, line: usize },

    #[error("Syntax error! Expecting ')' after expression, but reach end of expression.")]
    UnclosedParenAtEnd,

    #[error("Syntax error! Expecting identifier, number or '(', but got '{found}' instead.")]
    ExpectedFactor { found: String, line: usize },

    #[error("Syntax error! Expecting identifier, number or '(', but reach end of expression.")]
    ExpectedFactorAtEnd,
}

impl SyntaxError {
    /// The line of the offending token, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::TrailingInput { line, .. }
            | Self::UnclosedParen { line, .. }
            | Self::ExpectedFactor { line, .. } => Some(*line),
            Self::UnclosedParenAtEnd | Self::ExpectedFactorAtEnd => None,
        }
    }
}

/// Check that the tokens form exactly one expression.
pub fn recognize(tokens: &[Token]) -> Result<(), SyntaxError> {
    let mut parser = RecursiveDescent { tokens, pos: 0 };
    parser.exp()?;
    if let Some(token) = parser.peek() {
        return Err(SyntaxError::TrailingInput {
            found: token.text.clone(),
            line: token.line,
        });
    }
    tracing::info!("Syntax correct.");
    Ok(())
}

struct RecursiveDescent<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> RecursiveDescent<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) {
        if let Some(token) = self.peek() {
            tracing::trace!("consume {:?}", token);
        }
        self.pos += 1;
    }

    fn is(&self, kind: TokenKind, texts: &[&str]) -> bool {
        matches!(self.peek(), Some(t) if t.kind == kind && texts.contains(&t.text.as_str()))
    }

    fn is_add_op(&self) -> bool {
        self.is(TokenKind::Operator, &["+", "-"])
    }

    fn is_mul_op(&self) -> bool {
        self.is(TokenKind::Operator, &["*", "/"])
    }

    fn exp(&mut self) -> Result<(), SyntaxError> {
        if self.is_add_op() {
            self.consume();
        }
        self.term()?;
        while self.is_add_op() {
            self.consume();
            self.term()?;
        }
        Ok(())
    }

    fn term(&mut self) -> Result<(), SyntaxError> {
        self.factor()?;
        while self.is_mul_op() {
            self.consume();
            self.factor()?;
        }
        Ok(())
    }

    fn factor(&mut self) -> Result<(), SyntaxError> {
        match self.peek() {
            Some(t) if matches!(t.kind, TokenKind::Identifier | TokenKind::Number) => {
                self.consume();
                Ok(())
            }
            Some(t) if t.kind == TokenKind::Delimiter && t.text == "(" => {
                self.consume();
                self.exp()?;
                match self.peek() {
                    Some(t) if t.kind == TokenKind::Delimiter && t.text == ")" => {
                        self.consume();
                        Ok(())
                    }
                    Some(t) => Err(SyntaxError::UnclosedParen {
                        found: t.text.clone(),
                        line: t.line,
                    }),
                    None => Err(SyntaxError::UnclosedParenAtEnd),
                }
            }
            Some(t) => Err(SyntaxError::ExpectedFactor {
                found: t.text.clone(),
                line: t.line,
            }),
            None => Err(SyntaxError::ExpectedFactorAtEnd),
        }
    }
}
