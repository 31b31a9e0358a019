//! The arithmetic expression grammars of PL/0, driven by the table-driven engine.

use crate::{
    grammar::{ActionID, Grammar, GrammarDefError, TerminalID},
    lexer::{Token, TokenKind},
    table::{PredictionTable, TableError},
};
use pl0_runtime::{
    action::{builtin, ActionRegistry, RegistryError},
    definition::TokenValue,
    engine::{self, ParseEngine, ParseError},
};
use std::fmt;

/// The attributed grammar that evaluates an expression while parsing it.
///
/// `E''` and `T'` receive the value of the left operand as an inherited
/// attribute.
pub const EVALUATOR_GRAMMAR: &str = r#"
@start S;
@inherit E'' T';

S   -> E {0};
E   -> + E' {1} | - E' {2} | E' {3};
E'  -> T {4} E'' {5};
E'' -> + T {6} E'' {7} | - T {8} E'' {9} | ε {10};
T   -> F {11} T' {12};
T'  -> * F {13} T' {14} | / F {15} T' {16} | ε {17};
F   -> ( E {18} ) | id {19} | num {20};
"#;

/// The syntax-only grammar of expressions.
pub const RECOGNIZER_GRAMMAR: &str = r#"
@start S;

S   -> E;
E   -> + E' | - E' | E';
E'  -> T E'';
E'' -> + T E'' | - T E'' | ε;
T   -> F T';
T'  -> * F T' | / F T' | ε;
F   -> ( E ) | id | num;
"#;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid grammar: {}", _0)]
    Grammar(#[from] GrammarDefError),

    #[error("invalid prediction table: {}", _0)]
    Table(#[from] TableError),

    #[error("invalid action registry: {}", _0)]
    Registry(#[from] RegistryError),
}

/// An input token resolved to a terminal symbol of a grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalToken {
    pub terminal: TerminalID,
    pub value: TokenValue,
    pub text: String,
}

impl engine::Token<TerminalID> for TerminalToken {
    fn to_index(&self) -> TerminalID {
        self.terminal
    }

    fn value(&self) -> TokenValue {
        self.value
    }
}

impl fmt::Display for TerminalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}'", self.text)
    }
}

/// Translate the lexer tokens into the terminal symbols of the grammar.
///
/// Keywords, operators and delimiters stand for themselves, identifiers
/// become `id` and numbers become `num`. Tokens without a counterpart in the
/// grammar are mapped to [`TerminalID::UNKNOWN`].
pub fn resolve_tokens(grammar: &Grammar, tokens: &[Token], with_values: bool) -> Vec<TerminalToken> {
    tokens
        .iter()
        .map(|token| {
            let name = match token.kind {
                TokenKind::Identifier => Some("id"),
                TokenKind::Number => Some("num"),
                TokenKind::Keyword | TokenKind::Operator | TokenKind::Delimiter => {
                    Some(token.text.as_str())
                }
                TokenKind::Invalid => None,
            };
            let terminal = name
                .and_then(|name| grammar.terminal_by_name(name))
                .unwrap_or(TerminalID::UNKNOWN);

            let value = match token.kind {
                _ if !with_values => TokenValue::None,
                TokenKind::Identifier => TokenValue::Unknown,
                TokenKind::Number => match token.text.parse() {
                    Ok(n) => TokenValue::Int(n),
                    Err(err) => {
                        tracing::warn!("line {}: `{}' is out of range: {}", token.line, token.text, err);
                        TokenValue::Unknown
                    }
                },
                _ => TokenValue::None,
            };

            TerminalToken {
                terminal,
                value,
                text: token.text.clone(),
            }
        })
        .collect()
}

/// Evaluates arithmetic expressions during the LL(1) parse.
#[derive(Debug)]
pub struct Calculator {
    grammar: Grammar,
    table: PredictionTable,
    actions: ActionRegistry<ActionID>,
}

impl Calculator {
    pub fn new() -> Result<Self, BuildError> {
        let grammar = Grammar::from_str(EVALUATOR_GRAMMAR)?;
        let table = PredictionTable::generate(&grammar)?;

        let mut actions = ActionRegistry::new();
        let ids: Vec<ActionID> = {
            let mut ids: Vec<ActionID> = grammar.rules().flat_map(|rule| rule.actions()).collect();
            ids.sort();
            ids.dedup();
            ids
        };
        for id in ids {
            match id.into_raw() {
                0 => actions.register(id, builtin::emit)?,
                2 => actions.register(id, builtin::negate)?,
                6 => actions.register(id, builtin::add)?,
                8 => actions.register(id, builtin::sub)?,
                13 => actions.register(id, builtin::mul)?,
                15 => actions.register(id, builtin::div)?,
                _ => actions.register(id, builtin::assign)?,
            }
        }

        Ok(Self {
            grammar,
            table,
            actions,
        })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn table(&self) -> &PredictionTable {
        &self.table
    }

    /// Evaluate the expression made of the specified tokens.
    pub fn evaluate(&self, tokens: &[Token]) -> Result<i64, ParseError> {
        let tokens = resolve_tokens(&self.grammar, tokens, true);
        let engine = ParseEngine::new(&self.table, &self.actions);
        engine
            .parse(tokens)?
            .ok_or_else(|| ParseError::Internal("the start symbol left no value".into()))
    }

    pub fn evaluate_str(&self, source: &str) -> Result<i64, ParseError> {
        self.evaluate(&crate::lexer::tokenize(source))
    }
}

/// Checks the syntax of expressions with the LL(1) table, without evaluation.
#[derive(Debug)]
pub struct Recognizer {
    grammar: Grammar,
    table: PredictionTable,
    actions: ActionRegistry<ActionID>,
}

impl Recognizer {
    pub fn new() -> Result<Self, BuildError> {
        let grammar = Grammar::from_str(RECOGNIZER_GRAMMAR)?;
        let table = PredictionTable::generate(&grammar)?;
        Ok(Self {
            grammar,
            table,
            actions: ActionRegistry::new(),
        })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn table(&self) -> &PredictionTable {
        &self.table
    }

    pub fn check(&self, tokens: &[Token]) -> Result<(), ParseError> {
        let tokens = resolve_tokens(&self.grammar, tokens, false);
        let engine = ParseEngine::new(&self.table, &self.actions);
        engine.parse(tokens)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use pl0_runtime::engine::ErrorKind;

    #[test]
    fn evaluation() {
        let calc = Calculator::new().unwrap();
        assert_eq!(calc.evaluate_str("1+2*3").unwrap(), 7);
        assert_eq!(calc.evaluate_str("(1+2)*3").unwrap(), 9);
        assert_eq!(calc.evaluate_str("10-4-3").unwrap(), 3);
        assert_eq!(calc.evaluate_str("100/10/5").unwrap(), 2);
        assert_eq!(calc.evaluate_str("-2*3").unwrap(), -6);
        assert_eq!(calc.evaluate_str("-(4-6)").unwrap(), 2);
        assert_eq!(calc.evaluate_str("+7").unwrap(), 7);
        assert_eq!(calc.evaluate_str("2*(3+4)*5-6/2").unwrap(), 67);
        assert_eq!(calc.evaluate_str("((42))").unwrap(), 42);
    }

    #[test]
    fn semantic_errors() {
        let calc = Calculator::new().unwrap();
        let err = calc.evaluate_str("1/0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
        let err = calc.evaluate_str("a+1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
    }

    #[test]
    fn syntax_errors() {
        let calc = Calculator::new().unwrap();
        let err = calc.evaluate_str("1+").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);

        let err = calc.evaluate_str(")1(").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(matches!(err, ParseError::NoProduction { ref found, .. } if found == "`)'"));

        for source in ["", "1 2", "(1+2", "1+2)", "1 ? 2", "1 := 2", "begin"] {
            let err = calc.evaluate_str(source).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Syntax, "{:?}", source);
        }
    }

    #[test]
    fn recognizer() {
        let recognizer = Recognizer::new().unwrap();
        for source in ["a+b*c", "-(x1-2)/y", "((a))", "+3"] {
            recognizer.check(&tokenize(source)).unwrap();
        }
        for source in ["a+", "(a", "a b", "*a", ""] {
            let err = recognizer.check(&tokenize(source)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Syntax, "{:?}", source);
        }
    }

    #[test]
    fn unknown_tokens() {
        let calc = Calculator::new().unwrap();
        let tokens = resolve_tokens(calc.grammar(), &tokenize("x := 1;"), true);
        assert_eq!(tokens[0].terminal, calc.grammar().terminal_by_name("id").unwrap());
        assert_eq!(tokens[0].value, TokenValue::Unknown);
        assert_eq!(tokens[1].terminal, TerminalID::UNKNOWN);
        assert_eq!(tokens[2].value, TokenValue::Int(1));
        assert_eq!(tokens[3].terminal, TerminalID::UNKNOWN);
    }

    #[test]
    fn end_marker_in_source() {
        let calc = Calculator::new().unwrap();
        let tokens = resolve_tokens(calc.grammar(), &tokenize("1 # 2"), true);
        assert_eq!(tokens[1].terminal, TerminalID::UNKNOWN);

        let err = calc.evaluate_str("1 # 2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(matches!(err, ParseError::NoProduction { ref found, .. } if found == "`#'"));
    }
}
