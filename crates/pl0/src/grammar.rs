//! Grammar types.

use crate::{syntax::ast as s, types::Map, util::display_fn};
use std::{borrow::Cow, fmt, fs, io, path::Path};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: u16,
}
impl TerminalID {
    /// Reserved symbol used as a terminal symbol that means the end of input (`#`).
    pub const EOI: Self = Self::new(0);

    /// Reserved symbol assigned to input tokens that have no counterpart in
    /// the grammar. It never appears in any SELECT set.
    pub const UNKNOWN: Self = Self::new(1);

    const OFFSET: u16 = 2;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }

    #[inline]
    pub(crate) const fn from_raw(raw: u16) -> Self {
        Self::new(raw)
    }
}

#[derive(Debug)]
pub struct Terminal {
    id: TerminalID,
    name: Cow<'static, str>,
}
impl Terminal {
    pub fn id(&self) -> TerminalID {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}
impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: u16,
}
impl NonterminalID {
    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

#[derive(Debug)]
pub struct Nonterminal {
    id: NonterminalID,
    name: Cow<'static, str>,
    inherited: bool,
}
impl Nonterminal {
    pub fn id(&self) -> NonterminalID {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this symbol receives an inherited attribute when it is expanded.
    pub fn is_inherited(&self) -> bool {
        self.inherited
    }
}
impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The identifier of a semantic action embedded in a production.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ActionID(u16);
impl ActionID {
    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.0
    }
}
impl fmt::Display for ActionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
    A(ActionID),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RuleID {
    raw: u16,
}

impl RuleID {
    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

/// The type that represents a production rule in grammar.
#[derive(Debug)]
pub struct Rule {
    id: RuleID,
    left: NonterminalID,
    right: Vec<SymbolID>,
}
impl Rule {
    pub fn id(&self) -> RuleID {
        self.id
    }

    /// Return the left-hand side of this production.
    pub fn left(&self) -> NonterminalID {
        self.left
    }

    /// Return the right-hand side of this production, including the actions.
    pub fn right(&self) -> &[SymbolID] {
        &self.right[..]
    }

    /// Return the grammar symbols of the right-hand side, skipping the actions.
    pub fn symbols(&self) -> impl Iterator<Item = SymbolID> + '_ {
        self.right
            .iter()
            .copied()
            .filter(|symbol| !matches!(symbol, SymbolID::A(..)))
    }

    pub fn actions(&self) -> impl Iterator<Item = ActionID> + '_ {
        self.right.iter().filter_map(|symbol| match symbol {
            SymbolID::A(a) => Some(*a),
            _ => None,
        })
    }

    /// Whether this rule is an ε-production.
    pub fn is_empty(&self) -> bool {
        self.symbols().next().is_none()
    }

    // `"LHS -> R1 {0} R2"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            write!(f, "{} ->", g.nonterminals[&self.left()])?;
            if self.is_empty() {
                write!(f, " ε")?;
            }
            for symbol in self.right() {
                match symbol {
                    SymbolID::T(t) => write!(f, " {}", g.terminals[t])?,
                    SymbolID::N(n) => write!(f, " {}", g.nonterminals[n])?,
                    SymbolID::A(a) => write!(f, " {}", a)?,
                }
            }
            Ok(())
        })
    }
}

/// The grammar definition used to derive the prediction table.
#[derive(Debug)]
#[non_exhaustive]
pub struct Grammar {
    pub terminals: Map<TerminalID, Terminal>,
    pub nonterminals: Map<NonterminalID, Nonterminal>,
    pub rules: Map<RuleID, Rule>,
    pub start_symbol: NonterminalID,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in self.terminals.values() {
            if terminal.id() == TerminalID::UNKNOWN {
                continue;
            }
            writeln!(f, "{}", terminal)?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for nonterminal in self.nonterminals.values() {
            write!(f, "{}", nonterminal)?;
            if nonterminal.id() == self.start_symbol {
                write!(f, " (start)")?;
            }
            if nonterminal.is_inherited() {
                write!(f, " (inherited)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## rules:")?;
        for rule in self.rules.values() {
            writeln!(f, "{}", rule.display(self))?;
        }

        Ok(())
    }
}

impl Grammar {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Grammar, GrammarDefError> {
        let source = fs::read_to_string(path).map_err(GrammarDefError::IO)?;
        Self::from_str(&source)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(source: &str) -> Result<Grammar, GrammarDefError> {
        let grammar = crate::syntax::parse(source).map_err(GrammarDefError::Syntax)?;
        Grammar::define(|g| define_grammar_from_syntax(g, grammar))
    }

    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
    {
        let mut def = GrammarDef::default();
        f(&mut def)?;
        def.end()
    }

    pub fn start_symbol(&self) -> NonterminalID {
        self.start_symbol
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> + '_ {
        self.rules.values()
    }

    pub fn rule(&self, id: RuleID) -> &Rule {
        &self.rules[&id]
    }

    pub fn terminal(&self, id: TerminalID) -> &Terminal {
        &self.terminals[&id]
    }

    pub fn nonterminal(&self, id: NonterminalID) -> &Nonterminal {
        &self.nonterminals[&id]
    }

    /// Look up a terminal declared in the grammar. The reserved end marker
    /// and the unknown terminal are never found by name.
    pub fn terminal_by_name(&self, name: &str) -> Option<TerminalID> {
        self.terminals
            .values()
            .filter(|t| t.id() != TerminalID::EOI && t.id() != TerminalID::UNKNOWN)
            .find(|t| t.name() == name)
            .map(|t| t.id())
    }

    pub fn nonterminal_by_name(&self, name: &str) -> Option<NonterminalID> {
        self.nonterminals
            .values()
            .find(|n| n.name() == name)
            .map(|n| n.id())
    }

    pub fn is_terminal(&self, name: &str) -> bool {
        self.terminal_by_name(name).is_some()
    }

    pub fn is_nonterminal(&self, name: &str) -> bool {
        self.nonterminal_by_name(name).is_some()
    }

    /// Report the nonterminal symbols that never appear on the left-hand
    /// side of a rule.
    pub fn validate(&self) -> Result<(), GrammarDefError> {
        let missing: Vec<&str> = self
            .nonterminals
            .values()
            .filter(|n| self.rules().all(|rule| rule.left() != n.id()))
            .map(|n| n.name())
            .collect();
        if !missing.is_empty() {
            return Err(GrammarDefError::Other {
                msg: format!("nonterminals without productions: {}", missing.join(", ")),
            });
        }
        Ok(())
    }
}

/// Classify the symbols of the textual notation.
///
/// Symbols beginning with an uppercase letter are nonterminals and the
/// rest are terminals.
fn define_grammar_from_syntax(g: &mut GrammarDef, grammar: s::Grammar) -> Result<(), GrammarDefError> {
    let mut terminals = Map::default();
    let mut nonterminals = Map::default();

    fn intern(
        g: &mut GrammarDef,
        terminals: &mut Map<String, TerminalID>,
        nonterminals: &mut Map<String, NonterminalID>,
        name: &str,
    ) -> Result<SymbolID, GrammarDefError> {
        if is_nonterminal_name(name) {
            if let Some(id) = nonterminals.get(name) {
                return Ok(SymbolID::N(*id));
            }
            let id = g.nonterminal(name)?;
            nonterminals.insert(name.to_owned(), id);
            Ok(SymbolID::N(id))
        } else {
            if let Some(id) = terminals.get(name) {
                return Ok(SymbolID::T(*id));
            }
            let id = g.terminal(name)?;
            terminals.insert(name.to_owned(), id);
            Ok(SymbolID::T(id))
        }
    }

    let mut start = None;
    let mut inherited = vec![];
    for stmt in grammar.stmts {
        match stmt {
            s::Stmt::StartDesc(s::StartDesc { name }) => {
                if start.replace(name).is_some() {
                    return Err("duplicate @start declaration".into());
                }
            }

            s::Stmt::InheritDesc(s::InheritDesc { idents }) => {
                inherited.extend(idents);
            }

            s::Stmt::RuleDesc(s::RuleDesc { left, productions }) => {
                let left = match intern(g, &mut terminals, &mut nonterminals, &left)? {
                    SymbolID::N(n) => n,
                    _ => {
                        return Err(format!(
                            "the left-hand side `{}' must start with an uppercase letter",
                            left
                        )
                        .into())
                    }
                };

                for production in productions {
                    let mut right = vec![];
                    for elem in production.elems {
                        match elem {
                            s::ProductionElem::Ident(name) => {
                                right.push(intern(g, &mut terminals, &mut nonterminals, &name)?);
                            }
                            s::ProductionElem::Action(n) => right.push(SymbolID::A(ActionID::new(n))),
                            s::ProductionElem::Empty => (),
                        }
                    }
                    g.rule(left, right)?;
                }
            }
        }
    }

    for name in inherited {
        let id = nonterminals
            .get(&name)
            .copied()
            .ok_or_else(|| format!("unknown inherited symbol: `{}'", name))?;
        g.inherited(id)?;
    }

    if let Some(name) = start {
        let id = nonterminals
            .get(&name)
            .copied()
            .ok_or_else(|| format!("unknown start symbol: `{}'", name))?;
        g.start_symbol(id)?;
    }

    Ok(())
}

fn is_nonterminal_name(name: &str) -> bool {
    name.starts_with(|ch: char| ch.is_uppercase())
}

/// The contextural values for building a `Grammar`.
#[derive(Debug)]
pub struct GrammarDef {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    rules: Map<RuleID, Rule>,
    start: Option<NonterminalID>,
    next_terminal_id: u16,
    next_nonterminal_id: u16,
    next_rule_id: u16,
}

impl Default for GrammarDef {
    fn default() -> Self {
        let mut def = Self {
            terminals: Map::default(),
            nonterminals: Map::default(),
            rules: Map::default(),
            start: None,
            next_terminal_id: TerminalID::OFFSET,
            next_nonterminal_id: 0,
            next_rule_id: 0,
        };
        def.insert_reserved();
        def
    }
}

impl GrammarDef {
    fn insert_reserved(&mut self) {
        self.terminals.insert(
            TerminalID::EOI,
            Terminal {
                id: TerminalID::EOI,
                name: "#".into(),
            },
        );
        self.terminals.insert(
            TerminalID::UNKNOWN,
            Terminal {
                id: TerminalID::UNKNOWN,
                name: "$unknown".into(),
            },
        );
    }

    /// Declare a terminal symbol used in this grammar.
    pub fn terminal(&mut self, name: &str) -> Result<TerminalID, GrammarDefError> {
        self.verify_new_name(name)?;

        let id = TerminalID::new(self.next_terminal_id);
        self.next_terminal_id = self
            .next_terminal_id
            .checked_add(1)
            .ok_or("too many terminal symbols")?;

        self.terminals.insert(
            id,
            Terminal {
                id,
                name: name.to_owned().into(),
            },
        );

        Ok(id)
    }

    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(&mut self, name: &str) -> Result<NonterminalID, GrammarDefError> {
        self.verify_new_name(name)?;

        let id = NonterminalID::new(self.next_nonterminal_id);
        self.next_nonterminal_id = self
            .next_nonterminal_id
            .checked_add(1)
            .ok_or("too many nonterminal symbols")?;

        self.nonterminals.insert(
            id,
            Nonterminal {
                id,
                name: name.to_owned().into(),
                inherited: false,
            },
        );

        Ok(id)
    }

    fn verify_new_name(&self, name: &str) -> Result<(), GrammarDefError> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(format!("incorrect symbol name: `{}'", name).into());
        }
        if self.terminals.values().any(|t| t.name() == name) {
            return Err(format!("The terminal `{}' has already been declared", name).into());
        }
        if self.nonterminals.values().any(|n| n.name() == name) {
            return Err(format!("The nonterminal `{}' has already been declared", name).into());
        }
        Ok(())
    }

    /// Mark a nonterminal symbol as the receiver of an inherited attribute.
    pub fn inherited(&mut self, symbol: NonterminalID) -> Result<(), GrammarDefError> {
        let nonterminal = self
            .nonterminals
            .get_mut(&symbol)
            .ok_or("undeclared nonterminal symbol")?;
        nonterminal.inherited = true;
        Ok(())
    }

    /// Specify a production rule into this grammer.
    ///
    /// An ε-production is specified as a right-hand side without grammar
    /// symbols, which may still contain actions.
    pub fn rule<I>(&mut self, left: NonterminalID, right: I) -> Result<RuleID, GrammarDefError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        if !self.nonterminals.contains_key(&left) {
            return Err("undeclared left-hand side".into());
        }

        let right_: Vec<SymbolID> = right.into_iter().collect();
        for symbol in &right_ {
            match symbol {
                SymbolID::T(TerminalID::EOI) | SymbolID::T(TerminalID::UNKNOWN) => {
                    return Err("reserved terminal symbol in production rule".into());
                }
                SymbolID::T(t) if !self.terminals.contains_key(t) => {
                    return Err("undeclared terminal symbol in production rule".into());
                }
                SymbolID::N(n) if !self.nonterminals.contains_key(n) => {
                    return Err("undeclared nonterminal symbol in production rule".into());
                }
                _ => (),
            }
        }

        for rule in self.rules.values() {
            if rule.left == left && rule.right == right_ {
                return Err(GrammarDefError::Other {
                    msg: "Duplicate production rule detected".into(),
                });
            }
        }

        let id = RuleID::new(self.next_rule_id);
        self.next_rule_id = self
            .next_rule_id
            .checked_add(1)
            .ok_or("too many production rules")?;
        self.rules.insert(
            id,
            Rule {
                id,
                left,
                right: right_,
            },
        );

        Ok(id)
    }

    /// Specify the start symbol for this grammar.
    pub fn start_symbol(&mut self, symbol: NonterminalID) -> Result<(), GrammarDefError> {
        if !self.nonterminals.contains_key(&symbol) {
            return Err("undeclared start symbol".into());
        }
        self.start.replace(symbol);
        Ok(())
    }

    /// Discard every symbol and rule defined so far.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn end(mut self) -> Result<Grammar, GrammarDefError> {
        // If not specified, the left-hand side of the first rule is used.
        let start = match self.start.take() {
            Some(start) => start,
            None => self
                .rules
                .values()
                .next()
                .map(|rule| rule.left)
                .ok_or_else(|| GrammarDefError::Other {
                    msg: "empty production rules".into(),
                })?,
        };

        Ok(Grammar {
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            rules: self.rules,
            start_symbol: start,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarDefError {
    #[error("IO error: {}", _0)]
    IO(io::Error),

    #[error("Syntax error: {}", _0)]
    Syntax(anyhow::Error),

    #[error("Other error: {}", msg)]
    Other { msg: String },
}
impl From<&str> for GrammarDefError {
    fn from(msg: &str) -> Self {
        Self::Other { msg: msg.into() }
    }
}
impl From<String> for GrammarDefError {
    fn from(msg: String) -> Self {
        Self::Other { msg }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_query() {
        let grammar = Grammar::define(|g| {
            let plus = g.terminal("+")?;
            let num = g.terminal("num")?;
            let e = g.nonterminal("E")?;
            let r = g.nonterminal("R")?;
            g.inherited(r)?;
            g.rule(e, [SymbolID::T(num), SymbolID::N(r)])?;
            g.rule(r, [SymbolID::T(plus), SymbolID::T(num), SymbolID::A(ActionID::new(0)), SymbolID::N(r)])?;
            g.rule(r, [SymbolID::A(ActionID::new(1))])?;
            Ok(())
        })
        .unwrap();
        eprintln!("{}", grammar);

        assert!(grammar.is_terminal("+"));
        assert!(grammar.is_terminal("num"));
        assert!(grammar.is_nonterminal("R"));
        assert!(!grammar.is_terminal("R"));
        assert!(!grammar.is_nonterminal("num"));
        assert!(!grammar.is_terminal("#"));
        assert_eq!(grammar.start_symbol(), grammar.nonterminal_by_name("E").unwrap());
        assert_eq!(grammar.rules().count(), 3);
        assert!(grammar.rules().nth(2).unwrap().is_empty());
        assert!(grammar.nonterminal(grammar.nonterminal_by_name("R").unwrap()).is_inherited());
        grammar.validate().unwrap();
    }

    #[test]
    fn duplicates_are_rejected() {
        let res = Grammar::define(|g| {
            g.terminal("a")?;
            g.nonterminal("a")?;
            Ok(())
        });
        assert!(res.is_err());

        let res = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let s = g.nonterminal("S")?;
            g.rule(s, [SymbolID::T(a)])?;
            g.rule(s, [SymbolID::T(a)])?;
            Ok(())
        });
        assert!(res.is_err());
    }

    #[test]
    fn clear_discards_everything() {
        let mut def = GrammarDef::default();
        let s = def.nonterminal("S").unwrap();
        def.rule(s, [SymbolID::A(ActionID::new(0))]).unwrap();
        def.clear();
        assert!(def.end().is_err());
    }

    #[test]
    fn from_notation() {
        let grammar = Grammar::from_str(
            r#"
            // expression with an inherited tail
            @start S;
            @inherit R;
            S -> num {0} R {1};
            R -> + num {2} R {3} | ε {4};
            "#,
        )
        .unwrap();
        eprintln!("{}", grammar);

        let s = grammar.nonterminal_by_name("S").unwrap();
        assert_eq!(grammar.start_symbol(), s);
        assert!(grammar.is_terminal("num"));
        assert!(grammar.is_terminal("+"));
        assert_eq!(grammar.rules().count(), 3);

        let rule = grammar.rules().nth(1).unwrap();
        assert_eq!(rule.display(&grammar).to_string(), "R -> + num {2} R {3}");
        assert_eq!(
            rule.actions().collect::<Vec<_>>(),
            vec![ActionID::new(2), ActionID::new(3)]
        );
        let rule = grammar.rules().nth(2).unwrap();
        assert_eq!(rule.display(&grammar).to_string(), "R -> ε {4}");
    }

    #[test]
    fn missing_production_is_reported() {
        let grammar = Grammar::from_str("S -> A b;").unwrap();
        assert!(grammar.validate().is_err());
    }

    #[test]
    fn lowercase_left_hand_side_is_rejected() {
        assert!(Grammar::from_str("s -> a;").is_err());
    }
}
