//! Construction of the LL(1) prediction table.

use crate::{
    analysis::Analysis,
    grammar::{ActionID, Grammar, NonterminalID, RuleID, SymbolID, TerminalID},
    types::Map,
    util::display_fn,
};
use pl0_runtime::definition::{ParseTable, Prediction, Symbol};
use std::{borrow::Cow, fmt};

/// The symbol type stored in the productions of the table.
pub type TableSymbol = Symbol<TerminalID, NonterminalID, ActionID>;

/// The configuration values for building the prediction table.
#[derive(Debug, Clone)]
pub struct Config {
    on_conflict: ConflictPolicy,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ConflictPolicy {
    Reject,
    LastWriteWins,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            on_conflict: ConflictPolicy::Reject,
        }
    }

    /// Report a conflicting slot as an error.
    ///
    /// This is the default behavior.
    pub fn reject_conflicts(&mut self) -> &mut Self {
        self.on_conflict = ConflictPolicy::Reject;
        self
    }

    /// Let the later rule overwrite a conflicting slot.
    ///
    /// Every overwritten slot is reported with a warning.
    pub fn last_write_wins(&mut self) -> &mut Self {
        self.on_conflict = ConflictPolicy::LastWriteWins;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error(
        "LL(1) conflict on ({nonterminal}, {terminal}): `{first}' and `{second}' are both predicted"
    )]
    Conflict {
        nonterminal: String,
        terminal: String,
        first: String,
        second: String,
    },

    #[error("`{rule}' has no action to receive the inherited attribute of {nonterminal}")]
    MissingInheritedAction { nonterminal: String, rule: String },
}

/// A cell of the prediction table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub rule: RuleID,
    pub production: Vec<TableSymbol>,
    /// The offset from the slot of the expanded nonterminal to the action that
    /// receives its inherited attribute.
    pub inherited: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionTable {
    start_symbol: NonterminalID,
    entries: Map<NonterminalID, Map<TerminalID, Entry>>,
    terminal_names: Map<TerminalID, String>,
    nonterminal_names: Map<NonterminalID, String>,
}

impl PredictionTable {
    pub fn generate(grammar: &Grammar) -> Result<Self, TableError> {
        Self::generate_with_config(grammar, &Config::new())
    }

    pub fn generate_with_config(grammar: &Grammar, config: &Config) -> Result<Self, TableError> {
        let analysis = Analysis::compute(grammar);
        Self::from_analysis(grammar, &analysis, config)
    }

    /// Build the table from the SELECT sets of an already analyzed grammar.
    pub fn from_analysis(
        grammar: &Grammar,
        analysis: &Analysis,
        config: &Config,
    ) -> Result<Self, TableError> {
        let span = tracing::debug_span!("prediction_table");
        let _entered = span.enter();

        let mut entries: Map<NonterminalID, Map<TerminalID, Entry>> = grammar
            .nonterminals
            .keys()
            .map(|id| (*id, Map::default()))
            .collect();

        for rule in grammar.rules() {
            let left = grammar.nonterminal(rule.left());
            let inherited = if left.is_inherited() {
                Some(inherited_offset(rule.right()).ok_or_else(|| {
                    TableError::MissingInheritedAction {
                        nonterminal: left.to_string(),
                        rule: rule.display(grammar).to_string(),
                    }
                })?)
            } else {
                None
            };

            let production: Vec<TableSymbol> = rule
                .right()
                .iter()
                .map(|symbol| match *symbol {
                    SymbolID::T(t) => Symbol::T(t),
                    SymbolID::N(n) => Symbol::N(n),
                    SymbolID::A(a) => Symbol::A(a),
                })
                .collect();

            let row = entries.entry(rule.left()).or_default();
            for terminal in analysis.select_set(rule.id()).iter() {
                let entry = Entry {
                    rule: rule.id(),
                    production: production.clone(),
                    inherited,
                };
                if let Some(old) = row.insert(terminal, entry) {
                    let nonterminal = left.to_string();
                    let terminal = grammar.terminal(terminal).to_string();
                    let first = grammar.rule(old.rule).display(grammar).to_string();
                    let second = rule.display(grammar).to_string();
                    match config.on_conflict {
                        ConflictPolicy::Reject => {
                            return Err(TableError::Conflict {
                                nonterminal,
                                terminal,
                                first,
                                second,
                            });
                        }
                        ConflictPolicy::LastWriteWins => {
                            tracing::warn!(
                                "LL(1) conflict on ({}, {}): `{}' is overwritten by `{}'",
                                nonterminal,
                                terminal,
                                first,
                                second
                            );
                        }
                    }
                }
            }
            tracing::debug!(
                "{} (inherited = {:?})",
                rule.display(grammar),
                inherited
            );
        }

        Ok(Self {
            start_symbol: grammar.start_symbol(),
            entries,
            terminal_names: grammar
                .terminals
                .values()
                .map(|t| (t.id(), t.name().to_owned()))
                .collect(),
            nonterminal_names: grammar
                .nonterminals
                .values()
                .map(|n| (n.id(), n.name().to_owned()))
                .collect(),
        })
    }

    pub fn get(&self, nonterminal: NonterminalID, terminal: TerminalID) -> Option<&Entry> {
        self.entries.get(&nonterminal)?.get(&terminal)
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, (id, row)) in self.entries.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### {}", g.nonterminal(*id))?;
                for (terminal, entry) in row {
                    write!(
                        f,
                        "- {} => {}",
                        g.terminal(*terminal),
                        g.rule(entry.rule).display(g)
                    )?;
                    if let Some(offset) = entry.inherited {
                        write!(f, " (inherited: +{})", offset)?;
                    }
                    writeln!(f)?;
                }
            }
            Ok(())
        })
    }
}

/// Calculate where the inherited attribute of the left-hand side is delivered.
///
/// The engine replaces the expanded nonterminal with the right-hand side
/// pushed in reverse, and every nonterminal occupies two slots (its
/// synthesized placeholder and itself). The first action of the right-hand
/// side therefore sits above the slot of the expanded nonterminal by the
/// total width of the symbols following it.
fn inherited_offset(right: &[SymbolID]) -> Option<usize> {
    let first_action = right.iter().position(|s| matches!(s, SymbolID::A(..)))?;
    Some(
        right[first_action + 1..]
            .iter()
            .map(|symbol| match symbol {
                SymbolID::N(..) => 2,
                SymbolID::T(..) | SymbolID::A(..) => 1,
            })
            .sum(),
    )
}

impl ParseTable for PredictionTable {
    type Terminal = TerminalID;
    type Nonterminal = NonterminalID;
    type Action = ActionID;

    fn start_symbol(&self) -> NonterminalID {
        self.start_symbol
    }

    fn predict(
        &self,
        current: NonterminalID,
        lookahead: Option<TerminalID>,
    ) -> Option<Prediction<'_, TerminalID, NonterminalID, ActionID>> {
        let entry = self.get(current, lookahead.unwrap_or(TerminalID::EOI))?;
        Some(Prediction {
            production: &entry.production,
            inherited: entry.inherited,
        })
    }

    fn terminal_name(&self, terminal: Option<TerminalID>) -> Cow<'_, str> {
        let id = terminal.unwrap_or(TerminalID::EOI);
        match self.terminal_names.get(&id) {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(format!("{:?}", id)),
        }
    }

    fn nonterminal_name(&self, nonterminal: NonterminalID) -> Cow<'_, str> {
        match self.nonterminal_names.get(&nonterminal) {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(format!("{:?}", nonterminal)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets() {
        let a = |n| SymbolID::A(ActionID::new(n));
        let t = SymbolID::T(TerminalID::from_raw(2));
        let g = Grammar::from_str("S -> x;").unwrap();
        let n = SymbolID::N(g.start_symbol());

        // E'' -> + T {6} E'' {7}
        assert_eq!(inherited_offset(&[t, n, a(6), n, a(7)]), Some(3));
        // E'' -> ε {10}
        assert_eq!(inherited_offset(&[a(10)]), Some(0));
        // F -> ( E {18} )
        assert_eq!(inherited_offset(&[t, n, a(18), t]), Some(1));
        assert_eq!(inherited_offset(&[t, n]), None);
    }

    #[test]
    fn deterministic() {
        let source = "
            @inherit R;
            S -> num {0} R {1};
            R -> + num {2} R {3} | ε {4};
        ";
        let g1 = Grammar::from_str(source).unwrap();
        let g2 = Grammar::from_str(source).unwrap();
        let t1 = PredictionTable::generate(&g1).unwrap();
        let t2 = PredictionTable::generate(&g1).unwrap();
        let t3 = PredictionTable::generate(&g2).unwrap();
        eprintln!("{}", t1.display(&g1));
        assert_eq!(t1, t2);
        assert_eq!(t1, t3);

        let r = g1.nonterminal_by_name("R").unwrap();
        let plus = g1.terminal_by_name("+").unwrap();
        assert_eq!(t1.get(r, plus).unwrap().inherited, Some(3));
        assert_eq!(t1.get(r, TerminalID::EOI).unwrap().inherited, Some(0));
        assert!(t1.get(r, TerminalID::UNKNOWN).is_none());

        let s = g1.start_symbol();
        assert_eq!(t1.get(s, g1.terminal_by_name("num").unwrap()).unwrap().inherited, None);
    }

    #[test]
    fn conflicts() {
        let g = Grammar::from_str("S -> a b | a c;").unwrap();
        let err = PredictionTable::generate(&g).unwrap_err();
        assert!(matches!(err, TableError::Conflict { ref terminal, .. } if terminal == "a"));

        let table =
            PredictionTable::generate_with_config(&g, Config::new().last_write_wins()).unwrap();
        let a = g.terminal_by_name("a").unwrap();
        let entry = table.get(g.start_symbol(), a).unwrap();
        assert_eq!(g.rule(entry.rule).display(&g).to_string(), "S -> a c");
    }

    #[test]
    fn inherited_rule_without_action() {
        let g = Grammar::from_str("@inherit S; S -> a;").unwrap();
        assert!(matches!(
            PredictionTable::generate(&g),
            Err(TableError::MissingInheritedAction { .. })
        ));
    }
}
