//! Parser definition.

use std::{borrow::Cow, fmt, hash::Hash};

/// The trait for abstracting the generated LL(1) prediction table.
pub trait ParseTable {
    /// The number to identify the terminal symbols.
    type Terminal: Copy + Eq + fmt::Debug;

    /// The number to identify the nonterminal symbols.
    type Nonterminal: Copy + Eq + fmt::Debug;

    /// The number to identify the semantic actions embedded in productions.
    type Action: Copy + Eq + Hash + fmt::Debug;

    /// Return the start symbol of the grammar.
    fn start_symbol(&self) -> Self::Nonterminal;

    /// Return the production predicted for the specified nonterminal and
    /// lookahead symbol.
    ///
    /// If there is no lookahead symbol, a `None` is passed as the end of input.
    fn predict(
        &self,
        current: Self::Nonterminal,
        lookahead: Option<Self::Terminal>,
    ) -> Option<Prediction<'_, Self::Terminal, Self::Nonterminal, Self::Action>>;

    /// Return the printable name of a terminal symbol, or of the end of input.
    fn terminal_name(&self, terminal: Option<Self::Terminal>) -> Cow<'_, str>;

    /// Return the printable name of a nonterminal symbol.
    fn nonterminal_name(&self, nonterminal: Self::Nonterminal) -> Cow<'_, str>;
}

impl<T: ?Sized> ParseTable for &T
where
    T: ParseTable,
{
    type Terminal = T::Terminal;
    type Nonterminal = T::Nonterminal;
    type Action = T::Action;

    fn start_symbol(&self) -> Self::Nonterminal {
        (**self).start_symbol()
    }

    fn predict(
        &self,
        current: Self::Nonterminal,
        lookahead: Option<Self::Terminal>,
    ) -> Option<Prediction<'_, Self::Terminal, Self::Nonterminal, Self::Action>> {
        (**self).predict(current, lookahead)
    }

    fn terminal_name(&self, terminal: Option<Self::Terminal>) -> Cow<'_, str> {
        (**self).terminal_name(terminal)
    }

    fn nonterminal_name(&self, nonterminal: Self::Nonterminal) -> Cow<'_, str> {
        (**self).nonterminal_name(nonterminal)
    }
}

/// A symbol appearing in the right-hand side of a predicted production.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Symbol<T, N, A> {
    T(T),
    N(N),
    A(A),
}

/// The table entry selected by [`ParseTable::predict`].
#[derive(Debug, Copy, Clone)]
pub struct Prediction<'t, T, N, A> {
    /// The right-hand side to be pushed, in grammar order. An empty slice
    /// (or one with only actions) stands for an ε-production.
    pub production: &'t [Symbol<T, N, A>],

    /// Where the inherited attribute carried by the expanded nonterminal is
    /// delivered, as an offset from the nonterminal's former stack slot.
    ///
    /// `None` means the value is not needed by this production and is
    /// discarded.
    pub inherited: Option<usize>,
}

/// The semantic value attached to an input token.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenValue {
    /// The token carries no value (keywords, operators, delimiters).
    None,

    /// The token carries a statically known integer (numerals).
    Int(i64),

    /// The token stands for a value that cannot be known while parsing
    /// (identifiers).
    Unknown,
}
