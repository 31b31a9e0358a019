//! The implementation of the attributed LL(1) parser engine.

use crate::{
    action::{ActionError, ActionRegistry},
    definition::{ParseTable, Symbol, TokenValue},
};
use std::fmt;

/// A trait for abstracting token symbols.
pub trait Token<TIdx> {
    /// Return the index value corresponding to this token.
    fn to_index(&self) -> TIdx;

    /// Return the semantic value carried by this token.
    fn value(&self) -> TokenValue {
        TokenValue::None
    }
}

/// A cell of the analysis stack.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Element<T, N, A> {
    kind: ElementKind<T, N, A>,
    values: Vec<i64>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ElementKind<T, N, A> {
    EndMarker,
    Terminal(T),
    Nonterminal(N),
    Synthesized(N),
    Action(A),
}

impl<T, N, A> Element<T, N, A> {
    fn new(kind: ElementKind<T, N, A>) -> Self {
        Self {
            kind,
            values: vec![],
        }
    }
}

/// The table-driven parser that evaluates semantic actions while parsing.
///
/// The engine keeps two stacks: the remaining input (with the end marker at
/// the bottom) and the analysis stack. Values flow downward through the
/// analysis stack:
///
/// * a matched numeral is delivered to the element directly below it,
/// * the value of a synthesized placeholder goes to the nearest action below,
/// * the result of an action goes to the nearest nonterminal or synthesized
///   placeholder below,
/// * a value carried by an expanded nonterminal is delivered at the offset
///   recorded in the prediction table.
pub struct ParseEngine<'r, TDef>
where
    TDef: ParseTable,
{
    table: TDef,
    actions: &'r ActionRegistry<TDef::Action>,
}

impl<'r, TDef> fmt::Debug for ParseEngine<'r, TDef>
where
    TDef: ParseTable + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseEngine")
            .field("table", &self.table)
            .field("actions", &self.actions)
            .finish()
    }
}

impl<'r, TDef> ParseEngine<'r, TDef>
where
    TDef: ParseTable,
{
    /// Create a parser engine using the specified table and actions.
    pub fn new(table: TDef, actions: &'r ActionRegistry<TDef::Action>) -> Self {
        Self { table, actions }
    }

    pub fn table(&self) -> &TDef {
        &self.table
    }

    /// Parse the whole token sequence.
    ///
    /// Returns the value left by the start symbol, if any. A grammar without
    /// semantic actions always yields `None` on success.
    pub fn parse<I, TTok>(&self, tokens: I) -> Result<Option<i64>, ParseError>
    where
        I: IntoIterator<Item = TTok>,
        TTok: Token<TDef::Terminal> + fmt::Display,
    {
        let mut input: Vec<TTok> = tokens.into_iter().collect();
        input.reverse();

        let start = self.table.start_symbol();
        let mut stack = vec![
            Element::new(ElementKind::EndMarker),
            Element::new(ElementKind::Synthesized(start)),
            Element::new(ElementKind::Nonterminal(start)),
        ];
        let mut result = None;

        while let Some(top) = stack.last() {
            tracing::trace!(
                "stack=[{}], input=[{}]",
                DisplayStack {
                    table: &self.table,
                    stack: &stack,
                },
                DisplayInput { input: &input },
            );

            let lookahead = input.last();
            match top.kind {
                ElementKind::EndMarker => {
                    if let Some(token) = lookahead {
                        return Err(ParseError::UnexpectedToken {
                            expected: self.table.terminal_name(None).into_owned(),
                            found: token.to_string(),
                        });
                    }
                    stack.pop();
                }

                ElementKind::Terminal(terminal) => {
                    let token = match lookahead {
                        Some(token) if token.to_index() == terminal => token,
                        _ => {
                            return Err(ParseError::UnexpectedToken {
                                expected: self.table.terminal_name(Some(terminal)).into_owned(),
                                found: self.describe(lookahead),
                            });
                        }
                    };
                    match token.value() {
                        TokenValue::None => {}
                        TokenValue::Unknown => {
                            return Err(ParseError::UnknownValue {
                                token: token.to_string(),
                            });
                        }
                        TokenValue::Int(value) => {
                            let below = stack.len().checked_sub(2).ok_or_else(|| {
                                ParseError::Internal("no element below the matched terminal".into())
                            })?;
                            stack[below].values.push(value);
                        }
                    }
                    stack.pop();
                    input.pop();
                }

                ElementKind::Nonterminal(current) => {
                    let prediction = self
                        .table
                        .predict(current, lookahead.map(|t| t.to_index()))
                        .ok_or_else(|| ParseError::NoProduction {
                            nonterminal: self.table.nonterminal_name(current).into_owned(),
                            found: self.describe(lookahead),
                        })?;

                    let popped = stack.pop().ok_or_else(|| {
                        ParseError::Internal("analysis stack is unexpectedly empty".into())
                    })?;
                    let base = stack.len();

                    for symbol in prediction.production.iter().rev() {
                        match *symbol {
                            Symbol::T(t) => stack.push(Element::new(ElementKind::Terminal(t))),
                            Symbol::A(a) => stack.push(Element::new(ElementKind::Action(a))),
                            Symbol::N(n) => {
                                stack.push(Element::new(ElementKind::Synthesized(n)));
                                stack.push(Element::new(ElementKind::Nonterminal(n)));
                            }
                        }
                    }

                    match (popped.values.as_slice(), prediction.inherited) {
                        ([], _) => {}
                        (&[value], Some(offset)) => {
                            let target = stack.get_mut(base + offset).ok_or_else(|| {
                                ParseError::Internal(format!(
                                    "inherited attribute of {} is routed outside of the stack (offset = {})",
                                    self.table.nonterminal_name(current),
                                    offset,
                                ))
                            })?;
                            target.values.push(value);
                        }
                        (&[value], None) => {
                            tracing::trace!(
                                "discard the value {} carried by {}",
                                value,
                                self.table.nonterminal_name(current)
                            );
                        }
                        (values, _) => {
                            return Err(ParseError::Internal(format!(
                                "{} carries {} values",
                                self.table.nonterminal_name(current),
                                values.len()
                            )));
                        }
                    }
                }

                ElementKind::Synthesized(current) => {
                    let popped = stack.pop().ok_or_else(|| {
                        ParseError::Internal("analysis stack is unexpectedly empty".into())
                    })?;
                    match popped.values.as_slice() {
                        [] => {}
                        &[value] => {
                            match stack
                                .iter_mut()
                                .rev()
                                .find(|e| matches!(e.kind, ElementKind::Action(..)))
                            {
                                Some(recipient) => recipient.values.push(value),
                                None => {
                                    tracing::debug!(
                                        "the value of {} is the final result",
                                        self.table.nonterminal_name(current)
                                    );
                                    result = Some(value);
                                }
                            }
                        }
                        values => {
                            return Err(ParseError::Internal(format!(
                                "synthesized attribute of {} has {} values",
                                self.table.nonterminal_name(current),
                                values.len()
                            )));
                        }
                    }
                }

                ElementKind::Action(id) => {
                    let f = self
                        .actions
                        .get(id)
                        .ok_or_else(|| ParseError::Internal(format!("action {:?} is not registered", id)))?;
                    let popped = stack.pop().ok_or_else(|| {
                        ParseError::Internal("analysis stack is unexpectedly empty".into())
                    })?;
                    let recipient = stack
                        .iter_mut()
                        .rev()
                        .find(|e| {
                            matches!(
                                e.kind,
                                ElementKind::Synthesized(..) | ElementKind::Nonterminal(..)
                            )
                        })
                        .ok_or_else(|| {
                            ParseError::Internal(format!("no recipient for the result of action {:?}", id))
                        })?;
                    let value = f(&popped.values)?;
                    tracing::trace!("action {:?}{:?} = {}", id, popped.values, value);
                    recipient.values.push(value);
                }
            }
        }

        if !input.is_empty() {
            return Err(ParseError::Internal(format!(
                "analysis stack is exhausted with {} tokens remaining",
                input.len()
            )));
        }

        Ok(result)
    }

    fn describe<TTok: fmt::Display>(&self, lookahead: Option<&TTok>) -> String {
        match lookahead {
            Some(token) => token.to_string(),
            None => self.table.terminal_name(None).into_owned(),
        }
    }
}

struct DisplayStack<'a, TDef: ParseTable> {
    table: &'a TDef,
    stack: &'a [Element<TDef::Terminal, TDef::Nonterminal, TDef::Action>],
}

impl<TDef: ParseTable> fmt::Display for DisplayStack<'_, TDef> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.stack.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match element.kind {
                ElementKind::EndMarker => write!(f, "{}", self.table.terminal_name(None))?,
                ElementKind::Terminal(t) => write!(f, "{}", self.table.terminal_name(Some(t)))?,
                ElementKind::Nonterminal(n) => write!(f, "{}", self.table.nonterminal_name(n))?,
                ElementKind::Synthesized(n) => write!(f, "{}.syn", self.table.nonterminal_name(n))?,
                ElementKind::Action(a) => write!(f, "{{{:?}}}", a)?,
            }
            if !element.values.is_empty() {
                write!(f, "{:?}", element.values)?;
            }
        }
        Ok(())
    }
}

struct DisplayInput<'a, TTok> {
    input: &'a [TTok],
}

impl<TTok: fmt::Display> fmt::Display for DisplayInput<'_, TTok> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.input.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

/// The category of a [`ParseError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input does not conform to the grammar.
    Syntax,
    /// The input is well-formed but cannot be evaluated.
    Semantic,
    /// The grammar, table or action wiring is broken.
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error: expected {expected}, but found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("syntax error: no production of {nonterminal} starts with {found}")]
    NoProduction { nonterminal: String, found: String },

    #[error("semantic error: the value of `{token}` is unknown")]
    UnknownValue { token: String },

    #[error("semantic error: {}", _0)]
    Action(#[from] ActionError),

    #[error("internal error: {}", _0)]
    Internal(String),
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnexpectedToken { .. } | Self::NoProduction { .. } => ErrorKind::Syntax,
            Self::UnknownValue { .. } | Self::Action(..) => ErrorKind::Semantic,
            Self::Internal(..) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{action::builtin, definition::Prediction};
    use std::borrow::Cow;

    // S -> num {0} R {1}
    // R -> + num {2} R {3} | ε {4}    (R inherits the running sum)
    const NUM: u8 = 0;
    const PLUS: u8 = 1;
    const S: u8 = 0;
    const R: u8 = 1;

    const S_RULE: &[Symbol<u8, u8, u8>] = &[Symbol::T(NUM), Symbol::A(0), Symbol::N(R), Symbol::A(1)];
    const R_PLUS: &[Symbol<u8, u8, u8>] = &[
        Symbol::T(PLUS),
        Symbol::T(NUM),
        Symbol::A(2),
        Symbol::N(R),
        Symbol::A(3),
    ];
    const R_EMPTY: &[Symbol<u8, u8, u8>] = &[Symbol::A(4)];

    #[derive(Debug)]
    struct SumTable;

    impl ParseTable for SumTable {
        type Terminal = u8;
        type Nonterminal = u8;
        type Action = u8;

        fn start_symbol(&self) -> u8 {
            S
        }

        fn predict(&self, current: u8, lookahead: Option<u8>) -> Option<Prediction<'_, u8, u8, u8>> {
            let (production, inherited) = match (current, lookahead) {
                (S, Some(NUM)) => (S_RULE, None),
                (R, Some(PLUS)) => (R_PLUS, Some(3)),
                (R, None) => (R_EMPTY, Some(0)),
                _ => return None,
            };
            Some(Prediction {
                production,
                inherited,
            })
        }

        fn terminal_name(&self, terminal: Option<u8>) -> Cow<'_, str> {
            match terminal {
                Some(NUM) => "num".into(),
                Some(PLUS) => "+".into(),
                Some(..) => "?".into(),
                None => "#".into(),
            }
        }

        fn nonterminal_name(&self, nonterminal: u8) -> Cow<'_, str> {
            match nonterminal {
                S => "S".into(),
                _ => "R".into(),
            }
        }
    }

    #[derive(Debug)]
    enum Tok {
        Num(i64),
        Id(&'static str),
        Plus,
    }

    impl Token<u8> for Tok {
        fn to_index(&self) -> u8 {
            match self {
                Tok::Num(..) | Tok::Id(..) => NUM,
                Tok::Plus => PLUS,
            }
        }

        fn value(&self) -> TokenValue {
            match self {
                Tok::Num(n) => TokenValue::Int(*n),
                Tok::Id(..) => TokenValue::Unknown,
                Tok::Plus => TokenValue::None,
            }
        }
    }

    impl fmt::Display for Tok {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Tok::Num(n) => write!(f, "{}", n),
                Tok::Id(name) => f.write_str(name),
                Tok::Plus => f.write_str("+"),
            }
        }
    }

    fn registry() -> ActionRegistry<u8> {
        let mut actions = ActionRegistry::new();
        actions.register(0, builtin::assign).unwrap();
        actions.register(1, builtin::emit).unwrap();
        actions.register(2, builtin::add).unwrap();
        actions.register(3, builtin::assign).unwrap();
        actions.register(4, builtin::assign).unwrap();
        actions
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn inherited_sum() {
        init_tracing();
        let actions = registry();
        let engine = ParseEngine::new(SumTable, &actions);
        let tokens = vec![Tok::Num(1), Tok::Plus, Tok::Num(2), Tok::Plus, Tok::Num(3)];
        assert_eq!(engine.parse(tokens).unwrap(), Some(6));
        assert_eq!(engine.parse(vec![Tok::Num(42)]).unwrap(), Some(42));
    }

    #[test]
    fn syntax_errors() {
        let actions = registry();
        let engine = ParseEngine::new(&SumTable, &actions);

        let err = engine.parse(vec![Tok::Num(1), Tok::Plus]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(matches!(err, ParseError::UnexpectedToken { ref found, .. } if found == "#"));

        let err = engine.parse(vec![Tok::Plus, Tok::Num(1)]).unwrap_err();
        assert!(matches!(err, ParseError::NoProduction { ref found, .. } if found == "+"));

        let err = engine.parse(Vec::<Tok>::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn unknown_value_is_semantic_error() {
        let actions = registry();
        let engine = ParseEngine::new(SumTable, &actions);
        let err = engine
            .parse(vec![Tok::Id("a"), Tok::Plus, Tok::Num(1)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
    }

    #[test]
    fn missing_action_is_internal_error() {
        let mut actions = ActionRegistry::new();
        actions.register(0, builtin::assign).unwrap();
        let engine = ParseEngine::new(SumTable, &actions);
        let err = engine.parse(vec![Tok::Num(1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
