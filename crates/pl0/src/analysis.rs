//! Calculation of FIRST, FOLLOW and SELECT sets.

use crate::{
    grammar::{Grammar, NonterminalID, RuleID, SymbolID, TerminalID},
    types::Map,
    util::{display_fn, write_set},
};
use std::fmt;

#[derive(Debug, Clone, Default)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}

impl TerminalSet {
    pub fn contains(&self, id: TerminalID) -> bool {
        self.inner.contains(id.into_raw().into())
    }
    pub fn insert(&mut self, id: TerminalID) -> bool {
        self.inner.insert(id.into_raw().into())
    }
    /// Add the elements of `other` and return whether this set has grown.
    pub fn union_with(&mut self, other: &Self) -> bool {
        let len = self.inner.len();
        self.inner.union_with(&other.inner);
        self.inner.len() != len
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.inner
            .iter()
            .filter_map(|raw| u16::try_from(raw).ok())
            .map(TerminalID::from_raw)
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| write_set(f, self.iter().map(|t| g.terminal(t))))
    }
}

impl PartialEq for TerminalSet {
    fn eq(&self, other: &Self) -> bool {
        self.inner.iter().eq(other.inner.iter())
    }
}
impl Eq for TerminalSet {}

impl FromIterator<TerminalID> for TerminalSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = TerminalID>,
    {
        Self {
            inner: iter.into_iter().map(|t| t.into_raw().into()).collect(),
        }
    }
}

/// The FIRST set of a symbol or a sequence of symbols.
///
/// The empty string ε is tracked by the `nullable` flag rather than as an
/// element of the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstSet {
    pub terminals: TerminalSet,
    pub nullable: bool,
}

impl FirstSet {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let names = self.terminals.iter().map(|t| g.terminal(t).name());
            write_set(f, names.chain(self.nullable.then_some("ε")))
        })
    }
}

/// The result of the grammar analysis.
///
/// The sets are only observable after all of them have reached their
/// fixed points.
#[derive(Debug)]
pub struct Analysis {
    first: Map<NonterminalID, FirstSet>,
    follow: Map<NonterminalID, TerminalSet>,
    select: Map<RuleID, TerminalSet>,
}

impl Analysis {
    /// Compute FIRST, FOLLOW and SELECT sets of the grammar, in this order.
    pub fn compute(grammar: &Grammar) -> Self {
        let span = tracing::debug_span!("analysis");
        let _entered = span.enter();

        let first = first_sets(grammar);
        let follow = follow_sets(grammar, &first);

        let mut select = Map::default();
        for rule in grammar.rules() {
            let FirstSet {
                terminals: mut set,
                nullable,
            } = first_of_sequence(&first, rule.symbols());
            if nullable {
                set.union_with(&follow[&rule.left()]);
            }
            select.insert(rule.id(), set);
        }

        Self {
            first,
            follow,
            select,
        }
    }

    /// `First(symbol)`
    ///
    /// Actions are invisible to the analysis and behave like ε.
    pub fn first_set(&self, symbol: SymbolID) -> FirstSet {
        first_of_sequence(&self.first, Some(symbol))
    }

    /// `First(X1 X2 ... Xn)`
    pub fn first_of(&self, symbols: &[SymbolID]) -> FirstSet {
        first_of_sequence(&self.first, symbols.iter().copied())
    }

    pub fn follow_set(&self, symbol: NonterminalID) -> &TerminalSet {
        &self.follow[&symbol]
    }

    pub fn select_set(&self, rule: RuleID) -> &TerminalSet {
        &self.select[&rule]
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            writeln!(f, "## FIRST")?;
            for (id, set) in &self.first {
                writeln!(f, "{}: {}", g.nonterminal(*id), set.display(g))?;
            }
            writeln!(f, "\n## FOLLOW")?;
            for (id, set) in &self.follow {
                writeln!(f, "{}: {}", g.nonterminal(*id), set.display(g))?;
            }
            writeln!(f, "\n## SELECT")?;
            for (id, set) in &self.select {
                writeln!(f, "{}: {}", g.rule(*id).display(g), set.display(g))?;
            }
            Ok(())
        })
    }
}

fn first_of_sequence<I>(first: &Map<NonterminalID, FirstSet>, symbols: I) -> FirstSet
where
    I: IntoIterator<Item = SymbolID>,
{
    let mut res = FirstSet::default();
    for symbol in symbols {
        match symbol {
            SymbolID::T(t) => {
                res.terminals.insert(t);
                return res;
            }
            SymbolID::N(n) => {
                let added = &first[&n];
                res.terminals.union_with(&added.terminals);
                if !added.nullable {
                    return res;
                }
            }
            SymbolID::A(..) => (),
        }
    }
    res.nullable = true;
    res
}

fn first_sets(grammar: &Grammar) -> Map<NonterminalID, FirstSet> {
    let mut map: Map<NonterminalID, FirstSet> = grammar
        .nonterminals
        .keys()
        .map(|id| (*id, FirstSet::default()))
        .collect();

    // 値が更新されなくなるまで繰り返す
    let mut pass = 0;
    let mut changed = true;
    while changed {
        changed = false;
        pass += 1;
        for rule in grammar.rules() {
            let added = first_of_sequence(&map, rule.symbols());
            let Some(current) = map.get_mut(&rule.left()) else {
                continue;
            };
            if current.terminals.union_with(&added.terminals) {
                changed = true;
            }
            if added.nullable && !current.nullable {
                current.nullable = true;
                changed = true;
            }
        }
        tracing::trace!("FIRST: pass {} (changed = {})", pass, changed);
    }

    map
}

fn follow_sets(
    grammar: &Grammar,
    first: &Map<NonterminalID, FirstSet>,
) -> Map<NonterminalID, TerminalSet> {
    let mut map: Map<NonterminalID, TerminalSet> = grammar
        .nonterminals
        .keys()
        .map(|id| (*id, TerminalSet::default()))
        .collect();
    if let Some(set) = map.get_mut(&grammar.start_symbol()) {
        set.insert(TerminalID::EOI);
    }

    // A -> α B β という構文規則に対し、
    //  1. Follow(B) ⊇ First(β) - {ε}
    //  2. β が nullable ならば Follow(B) ⊇ Follow(A)
    let mut pass = 0;
    let mut changed = true;
    while changed {
        changed = false;
        pass += 1;
        for rule in grammar.rules() {
            let symbols: Vec<SymbolID> = rule.symbols().collect();
            for (i, symbol) in symbols.iter().enumerate() {
                let SymbolID::N(n) = *symbol else {
                    continue;
                };
                let suffix = first_of_sequence(first, symbols[i + 1..].iter().copied());
                let mut added = suffix.terminals;
                if suffix.nullable {
                    added.union_with(&map[&rule.left()]);
                }
                if let Some(set) = map.get_mut(&n) {
                    if set.union_with(&added) {
                        changed = true;
                    }
                }
            }
        }
        tracing::trace!("FOLLOW: pass {} (changed = {})", pass, changed);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAMMAR: &str = "
        E   -> + T E'' | - T E'' | T E'';
        E'' -> + T E'' | - T E'' | ε;
        T   -> F T';
        T'  -> * F T' | / F T' | ε;
        F   -> ( E ) | id | num;
    ";

    fn terminals(g: &Grammar, names: &[&str]) -> TerminalSet {
        names
            .iter()
            .map(|name| match *name {
                "#" => TerminalID::EOI,
                name => g.terminal_by_name(name).unwrap(),
            })
            .collect()
    }

    fn rule_of(g: &Grammar, display: &str) -> RuleID {
        g.rules()
            .find(|rule| rule.display(g).to_string() == display)
            .unwrap_or_else(|| panic!("missing rule: {}", display))
            .id()
    }

    #[test]
    fn expression_sets() {
        let g = Grammar::from_str(GRAMMAR).unwrap();
        let analysis = Analysis::compute(&g);
        eprintln!("{}", analysis.display(&g));

        let n = |name: &str| g.nonterminal_by_name(name).unwrap();

        let first_f = analysis.first_set(SymbolID::N(n("F")));
        assert_eq!(first_f.terminals, terminals(&g, &["(", "id", "num"]));
        assert!(!first_f.nullable);
        let first_tail = analysis.first_set(SymbolID::N(n("T'")));
        assert_eq!(first_tail.terminals, terminals(&g, &["*", "/"]));
        assert!(first_tail.nullable);

        assert_eq!(*analysis.follow_set(n("E")), terminals(&g, &["#", ")"]));
        assert_eq!(*analysis.follow_set(n("E''")), terminals(&g, &["#", ")"]));
        assert_eq!(*analysis.follow_set(n("T")), terminals(&g, &["+", "-", "#", ")"]));
        assert_eq!(*analysis.follow_set(n("T'")), terminals(&g, &["+", "-", "#", ")"]));
        assert_eq!(
            *analysis.follow_set(n("F")),
            terminals(&g, &["*", "/", "+", "-", "#", ")"])
        );

        let select = |display: &str| analysis.select_set(rule_of(&g, display)).clone();
        assert_eq!(select("E -> + T E''"), terminals(&g, &["+"]));
        assert_eq!(select("E -> T E''"), terminals(&g, &["(", "id", "num"]));
        assert_eq!(select("E'' -> ε"), terminals(&g, &["#", ")"]));
        assert_eq!(select("T -> F T'"), terminals(&g, &["(", "id", "num"]));
        assert_eq!(select("T' -> * F T'"), terminals(&g, &["*"]));
        assert_eq!(select("T' -> ε"), terminals(&g, &["+", "-", "#", ")"]));
        assert_eq!(select("F -> ( E )"), terminals(&g, &["("]));
        assert_eq!(select("F -> num"), terminals(&g, &["num"]));
    }

    #[test]
    fn actions_are_invisible() {
        let g = Grammar::from_str("S -> {0} A {1} b; A -> {2} | a;").unwrap();
        let analysis = Analysis::compute(&g);

        let s = g.nonterminal_by_name("S").unwrap();
        let a = g.nonterminal_by_name("A").unwrap();
        let first_a = analysis.first_set(SymbolID::N(a));
        assert!(first_a.nullable);
        assert_eq!(first_a.terminals, terminals(&g, &["a"]));
        assert_eq!(
            analysis.first_set(SymbolID::N(s)).terminals,
            terminals(&g, &["a", "b"])
        );
        assert_eq!(*analysis.follow_set(a), terminals(&g, &["b"]));
        assert_eq!(
            analysis.select_set(rule_of(&g, "A -> ε {2}")).clone(),
            terminals(&g, &["b"])
        );
    }

    #[test]
    fn sequence_first() {
        let g = Grammar::from_str("S -> A B c; A -> a | ε; B -> b | ε;").unwrap();
        let analysis = Analysis::compute(&g);
        let a = SymbolID::N(g.nonterminal_by_name("A").unwrap());
        let b = SymbolID::N(g.nonterminal_by_name("B").unwrap());
        let c = SymbolID::T(g.terminal_by_name("c").unwrap());

        let first = analysis.first_of(&[a, b]);
        assert_eq!(first.terminals, terminals(&g, &["a", "b"]));
        assert!(first.nullable);

        let first = analysis.first_of(&[a, b, c]);
        assert_eq!(first.terminals, terminals(&g, &["a", "b", "c"]));
        assert!(!first.nullable);

        let first = analysis.first_of(&[]);
        assert!(first.terminals.is_empty());
        assert!(first.nullable);
    }
}
