//! Grammar types.

use crate::{first_sets, types::Map, util::display_fn};
use std::fmt;

/// Upper bound on the number of symbols; `u16::MAX` is reserved as the empty
/// marker of the packed lookahead array.
const MAX_SYMBOLS: usize = u16::MAX as usize - 1;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: u16,
}

impl TerminalID {
    /// Reserved symbol used as a terminal symbol that means the end of input.
    pub const EOF: Self = Self::from_raw(0);

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Debug for TerminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::EOF => write!(f, "T#EOF"),
            _ => write!(f, "T#{:03}", self.raw),
        }
    }
}

/// Identifier of a nonterminal symbol.
///
/// Nonterminal ids share the dense symbol id space with terminals, so the raw
/// value of a nonterminal is always greater than the id of every terminal.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: u16,
}

impl NonterminalID {
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Debug for NonterminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N#{:03}", self.raw)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

impl SymbolID {
    /// Return the position of this symbol in the dense symbol id space.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::T(t) => t.index(),
            Self::N(n) => n.index(),
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::T(..))
    }
}

impl fmt::Debug for SymbolID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::T(t) => write!(f, "{:?}", t),
            Self::N(n) => write!(f, "{:?}", n),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}

// compares the elements, regardless of the capacity of the bit vectors.
impl PartialEq for TerminalSet {
    fn eq(&self, other: &Self) -> bool {
        self.inner.iter().eq(other.inner.iter())
    }
}

impl Eq for TerminalSet {}

impl TerminalSet {
    pub fn contains(&self, id: TerminalID) -> bool {
        self.inner.contains(id.index())
    }
    pub fn insert(&mut self, id: TerminalID) -> bool {
        self.inner.insert(id.index())
    }
    /// Add all elements of `other` into this set, and return whether the set has grown.
    pub fn union_with(&mut self, other: &Self) -> bool {
        if other.inner.is_subset(&self.inner) {
            return false;
        }
        self.inner.union_with(&other.inner);
        true
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
            .map(|raw| TerminalID::from_raw(raw as u16))
    }
}

impl FromIterator<TerminalID> for TerminalSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = TerminalID>,
    {
        Self {
            inner: iter.into_iter().map(|t| t.index()).collect(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Precedence {
    pub priority: u16,
    pub assoc: Assoc,
}

impl Precedence {
    pub const fn new(priority: u16, assoc: Assoc) -> Self {
        Self { priority, assoc }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Assoc {
    Left,
    Right,
    Nonassoc,
}

impl fmt::Display for Assoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Nonassoc => write!(f, "nonassoc"),
        }
    }
}

#[derive(Debug)]
pub struct Terminal {
    id: TerminalID,
    name: String,
    literal: Option<String>,
    precedence: Option<Precedence>,
}

impl Terminal {
    pub fn id(&self) -> TerminalID {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// The text matched by a constant terminal.
    pub fn literal(&self) -> Option<&str> {
        self.literal.as_deref()
    }
    pub fn precedence(&self) -> Option<Precedence> {
        self.precedence
    }
    /// Whether a shifted token of this kind carries a semantic value.
    pub fn carries_value(&self) -> bool {
        self.id != TerminalID::EOF && self.literal.is_none()
    }
}

#[derive(Debug)]
pub struct Nonterminal {
    id: NonterminalID,
    name: String,
    productions: Vec<ProductionID>,
    nullable: bool,
    first: TerminalSet,
}

impl Nonterminal {
    pub fn id(&self) -> NonterminalID {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// The derivation rules of this nonterminal, in declaration order.
    pub fn productions(&self) -> &[ProductionID] {
        &self.productions
    }
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
    /// The set of terminals that can begin a string derived from this symbol.
    pub fn first(&self) -> &TerminalSet {
        &self.first
    }
}

#[derive(Debug)]
pub enum Symbol {
    Terminal(Terminal),
    Nonterminal(Nonterminal),
}

impl Symbol {
    pub fn id(&self) -> SymbolID {
        match self {
            Self::Terminal(t) => SymbolID::T(t.id),
            Self::Nonterminal(n) => SymbolID::N(n.id),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Terminal(t) => &t.name,
            Self::Nonterminal(n) => &n.name,
        }
    }

    /// Whether this symbol matches the empty string.
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Terminal(..) => false,
            Self::Nonterminal(n) => n.nullable,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ProductionID {
    raw: u16,
}

impl ProductionID {
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Debug for ProductionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P#{:03}", self.raw)
    }
}

/// An element of the right-hand side of a production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RhsItem {
    pub name: Option<String>,
    pub symbol: SymbolID,
}

/// The type that represents a production rule in grammar.
#[derive(Debug)]
pub struct Production {
    id: ProductionID,
    name: Option<String>,
    left: NonterminalID,
    right: Vec<RhsItem>,
    precedence: Option<Precedence>,
}

impl Production {
    pub fn id(&self) -> ProductionID {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Return the left-hand side of this production.
    pub fn left(&self) -> NonterminalID {
        self.left
    }

    /// Return the right-hand side of this production.
    pub fn right(&self) -> &[RhsItem] {
        &self.right[..]
    }

    /// Return the symbol at the specified position of the right-hand side.
    pub fn symbol_at(&self, index: usize) -> Option<SymbolID> {
        self.right.get(index).map(|item| item.symbol)
    }

    pub fn len(&self) -> usize {
        self.right.len()
    }

    pub fn is_empty(&self) -> bool {
        self.right.is_empty()
    }

    /// The resolved precedence: either the explicit one, or the precedence of
    /// the rightmost terminal on the right-hand side.
    pub fn precedence(&self) -> Option<Precedence> {
        self.precedence
    }

    // `"LHS = R1 R2 R3"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            write!(f, "{} =", g.nonterminal(self.left).name())?;
            if self.right.is_empty() {
                f.write_str(" ε")?;
            }
            for item in &self.right {
                write!(f, " {}", g.symbol(item.symbol).name())?;
                if let Some(name) = &item.name {
                    write!(f, ".{}", name)?;
                }
            }
            Ok(())
        })
    }
}

/// Non-fatal findings about a grammar definition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GrammarWarning {
    /// A declared terminal is never referenced by any production.
    UnusedTerminal { name: String },

    /// A nonterminal cannot be derived from the goal symbol.
    UnreachableNonterminal { name: String },
}

impl fmt::Display for GrammarWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnusedTerminal { name } => {
                write!(f, "terminal `{}' is never used in production rules", name)
            }
            Self::UnreachableNonterminal { name } => {
                write!(f, "nonterminal `{}' is unreachable from the goal symbol", name)
            }
        }
    }
}

/// The grammar definition used to derive the parser tables.
#[derive(Debug)]
pub struct Grammar {
    symbols: Vec<Symbol>,
    productions: Vec<Production>,
    terminal_count: usize,
    first_value_terminal: TerminalID,
    error: NonterminalID,
    goal: NonterminalID,
    accept_production: ProductionID,
    augmented: bool,
    warnings: Vec<GrammarWarning>,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in self.terminals() {
            write!(f, "{}", terminal.name())?;
            if let Some(literal) = terminal.literal() {
                write!(f, " {:?}", literal)?;
            }
            if let Some(prec) = terminal.precedence() {
                write!(f, " (priority={}, assoc={})", prec.priority, prec.assoc)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for nonterminal in self.nonterminals() {
            write!(f, "{}", nonterminal.name())?;
            if nonterminal.id() == self.goal {
                write!(f, " (goal)")?;
            }
            if nonterminal.is_nullable() {
                write!(f, " (nullable)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## productions:")?;
        for production in &self.productions {
            write!(f, "{:?}: {}", production.id(), production.display(self))?;
            if let Some(prec) = production.precedence() {
                write!(f, " (priority={}, assoc={})", prec.priority, prec.assoc)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

impl Grammar {
    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
    {
        let mut def = GrammarDef::default();
        f(&mut def)?;
        def.end()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol(&self, id: SymbolID) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn terminal_count(&self) -> usize {
        self.terminal_count
    }

    pub fn nonterminal_count(&self) -> usize {
        self.symbols.len() - self.terminal_count
    }

    pub fn terminals(&self) -> impl Iterator<Item = &Terminal> + '_ {
        self.symbols[..self.terminal_count]
            .iter()
            .filter_map(|s| match s {
                Symbol::Terminal(t) => Some(t),
                Symbol::Nonterminal(..) => None,
            })
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = &Nonterminal> + '_ {
        self.symbols[self.terminal_count..]
            .iter()
            .filter_map(|s| match s {
                Symbol::Nonterminal(n) => Some(n),
                Symbol::Terminal(..) => None,
            })
    }

    pub fn terminal(&self, id: TerminalID) -> &Terminal {
        match &self.symbols[id.index()] {
            Symbol::Terminal(t) => t,
            Symbol::Nonterminal(..) => unreachable!("{:?} is not a terminal", id),
        }
    }

    pub fn nonterminal(&self, id: NonterminalID) -> &Nonterminal {
        match &self.symbols[id.index()] {
            Symbol::Nonterminal(n) => n,
            Symbol::Terminal(..) => unreachable!("{:?} is not a nonterminal", id),
        }
    }

    fn nonterminal_mut(&mut self, id: NonterminalID) -> &mut Nonterminal {
        match &mut self.symbols[id.index()] {
            Symbol::Nonterminal(n) => n,
            Symbol::Terminal(..) => unreachable!("{:?} is not a nonterminal", id),
        }
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    pub fn production(&self, id: ProductionID) -> &Production {
        &self.productions[id.index()]
    }

    pub fn terminal_id(&self, name: &str) -> Option<TerminalID> {
        self.terminals().find(|t| t.name == name).map(|t| t.id)
    }

    pub fn nonterminal_id(&self, name: &str) -> Option<NonterminalID> {
        self.nonterminals().find(|n| n.name == name).map(|n| n.id)
    }

    /// The goal symbol specified by the grammar definition.
    pub fn goal(&self) -> NonterminalID {
        self.goal
    }

    /// The production whose completion on the end of input accepts the input.
    pub fn accept_production(&self) -> ProductionID {
        self.accept_production
    }

    /// Whether the synthetic production `$goal = Goal` has been added.
    pub fn is_augmented(&self) -> bool {
        self.augmented
    }

    /// The built-in `error` nonterminal used by recovery productions.
    pub fn error_symbol(&self) -> NonterminalID {
        self.error
    }

    /// The smallest id of the terminals that carry a semantic value.
    ///
    /// Constant terminals are numbered before value-carrying ones, so every
    /// terminal at or after this id carries a value.
    pub fn first_value_terminal(&self) -> TerminalID {
        self.first_value_terminal
    }

    pub fn warnings(&self) -> &[GrammarWarning] {
        &self.warnings
    }
}

/// An element of a rule's right-hand side, given by name.
#[derive(Debug, Copy, Clone)]
pub struct RhsItemDef<'a> {
    name: Option<&'a str>,
    symbol: &'a str,
}

impl<'a> RhsItemDef<'a> {
    /// A right-hand side element whose value is bound to `name`.
    pub fn bound(name: &'a str, symbol: &'a str) -> Self {
        Self {
            name: Some(name),
            symbol,
        }
    }
}

impl<'a> From<&'a str> for RhsItemDef<'a> {
    fn from(symbol: &'a str) -> Self {
        Self { name: None, symbol }
    }
}

/// Additional settings of a production rule.
#[derive(Debug, Default, Copy, Clone)]
pub struct RuleOptions<'a> {
    /// The name to disambiguate this production.
    pub name: Option<&'a str>,
    /// The terminal whose precedence is assigned to the production (`%prec`).
    pub precedence: Option<&'a str>,
}

#[derive(Debug)]
struct TerminalDecl {
    name: String,
    literal: Option<String>,
}

#[derive(Debug)]
struct RuleDecl {
    left: String,
    right: Vec<(Option<String>, String)>,
    name: Option<String>,
    precedence: Option<String>,
}

/// The contextural values for building a `Grammar`.
#[derive(Debug, Default)]
pub struct GrammarDef {
    terminals: Vec<TerminalDecl>,
    precedences: Vec<(Assoc, Vec<String>)>,
    nonterminals: Vec<String>,
    rules: Vec<RuleDecl>,
    start: Option<String>,
}

const EOF_NAME: &str = "$eof";
const ERROR_NAME: &str = "error";
const GOAL_NAME: &str = "$goal";

impl GrammarDef {
    /// Declare a terminal symbol that carries a semantic value.
    pub fn terminal(&mut self, name: &str) -> Result<(), GrammarDefError> {
        self.declare_terminal(name, None)
    }

    /// Declare a constant terminal symbol matching the specified text.
    pub fn literal(&mut self, name: &str, text: &str) -> Result<(), GrammarDefError> {
        self.declare_terminal(name, Some(text.to_owned()))
    }

    fn declare_terminal(
        &mut self,
        name: &str,
        literal: Option<String>,
    ) -> Result<(), GrammarDefError> {
        verify_name(name)?;
        if self.terminals.iter().any(|t| t.name == name) {
            return Err(GrammarDefError::DuplicateTerminal { name: name.into() });
        }
        self.terminals.push(TerminalDecl {
            name: name.into(),
            literal,
        });
        Ok(())
    }

    /// Declare a precedence level for the specified terminals.
    ///
    /// Each call defines a level higher than all of the previous ones.
    pub fn precedence<I, S>(&mut self, assoc: Assoc, terminals: I) -> Result<(), GrammarDefError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = terminals
            .into_iter()
            .map(|s| s.as_ref().to_owned())
            .collect();
        self.precedences.push((assoc, names));
        Ok(())
    }

    /// Declare a nonterminal symbol used in this grammar.
    ///
    /// Nonterminals appearing on the left-hand side of a rule are declared implicitly.
    pub fn nonterminal(&mut self, name: &str) -> Result<(), GrammarDefError> {
        verify_name(name)?;
        if self.nonterminals.iter().any(|n| n == name) {
            return Err(GrammarDefError::DuplicateNonterminal { name: name.into() });
        }
        self.nonterminals.push(name.into());
        Ok(())
    }

    /// Specify a production rule into this grammer.
    pub fn rule<'a, I, R>(&mut self, left: &str, right: I) -> Result<ProductionID, GrammarDefError>
    where
        I: IntoIterator<Item = R>,
        R: Into<RhsItemDef<'a>>,
    {
        self.rule_with(left, right, RuleOptions::default())
    }

    /// Specify a production rule with additional settings.
    pub fn rule_with<'a, I, R>(
        &mut self,
        left: &str,
        right: I,
        options: RuleOptions<'_>,
    ) -> Result<ProductionID, GrammarDefError>
    where
        I: IntoIterator<Item = R>,
        R: Into<RhsItemDef<'a>>,
    {
        verify_name(left)?;
        let right = right
            .into_iter()
            .map(|r| {
                let r = r.into();
                (r.name.map(ToOwned::to_owned), r.symbol.to_owned())
            })
            .collect();
        if self.rules.len() >= MAX_SYMBOLS {
            return Err(GrammarDefError::TooManySymbols);
        }
        let id = ProductionID::from_raw(self.rules.len() as u16);
        self.rules.push(RuleDecl {
            left: left.into(),
            right,
            name: options.name.map(ToOwned::to_owned),
            precedence: options.precedence.map(ToOwned::to_owned),
        });
        Ok(id)
    }

    /// Specify the goal symbol for this grammar.
    ///
    /// If not specified, the left-hand side of the first rule is used.
    pub fn start_symbol(&mut self, name: &str) -> Result<(), GrammarDefError> {
        self.start.replace(name.into());
        Ok(())
    }

    fn end(self) -> Result<Grammar, GrammarDefError> {
        // Nonterminals: the explicit declarations first, then those introduced
        // by the left-hand sides of rules.
        let mut nonterminal_names: Vec<&str> = self.nonterminals.iter().map(|s| &**s).collect();
        for rule in &self.rules {
            if rule.left == ERROR_NAME {
                return Err(GrammarDefError::ReservedName {
                    name: rule.left.clone(),
                });
            }
            if !nonterminal_names.contains(&&*rule.left) {
                nonterminal_names.push(&rule.left);
            }
        }

        // +2: `$eof` and `error`, +1: a potential `$goal`.
        if self.terminals.len() + nonterminal_names.len() + 3 > MAX_SYMBOLS {
            return Err(GrammarDefError::TooManySymbols);
        }

        let mut symbols = Vec::new();
        let mut terminal_ids = Map::<&str, TerminalID>::default();
        symbols.push(Symbol::Terminal(Terminal {
            id: TerminalID::EOF,
            name: EOF_NAME.into(),
            literal: None,
            precedence: None,
        }));
        // Constant terminals are numbered before the value-carrying ones.
        let ordered = (self.terminals.iter().filter(|t| t.literal.is_some()))
            .chain(self.terminals.iter().filter(|t| t.literal.is_none()));
        let mut first_value_terminal = None;
        for decl in ordered {
            let id = TerminalID::from_raw(symbols.len() as u16);
            if decl.literal.is_none() && first_value_terminal.is_none() {
                first_value_terminal = Some(id);
            }
            terminal_ids.insert(&decl.name, id);
            symbols.push(Symbol::Terminal(Terminal {
                id,
                name: decl.name.clone(),
                literal: decl.literal.clone(),
                precedence: None,
            }));
        }
        let terminal_count = symbols.len();
        let first_value_terminal =
            first_value_terminal.unwrap_or(TerminalID::from_raw(terminal_count as u16));

        let mut nonterminal_ids = Map::<&str, NonterminalID>::default();
        let error = NonterminalID::from_raw(symbols.len() as u16);
        nonterminal_ids.insert(ERROR_NAME, error);
        symbols.push(Symbol::Nonterminal(Nonterminal {
            id: error,
            name: ERROR_NAME.into(),
            productions: vec![],
            nullable: false,
            first: TerminalSet::default(),
        }));
        for name in nonterminal_names {
            if nonterminal_ids.contains_key(name) {
                return Err(GrammarDefError::ReservedName { name: name.into() });
            }
            let id = NonterminalID::from_raw(symbols.len() as u16);
            nonterminal_ids.insert(name, id);
            symbols.push(Symbol::Nonterminal(Nonterminal {
                id,
                name: name.into(),
                productions: vec![],
                nullable: false,
                first: TerminalSet::default(),
            }));
        }

        // Precedence levels, from the lowest to the highest.
        for (level, (assoc, names)) in self.precedences.iter().enumerate() {
            let prec = Precedence::new(level as u16 + 1, *assoc);
            for name in names {
                let id = terminal_ids.get(&**name).copied().ok_or_else(|| {
                    GrammarDefError::UnknownSymbol {
                        name: name.clone(),
                        referrer: "a precedence declaration".into(),
                    }
                })?;
                let Symbol::Terminal(terminal) = &mut symbols[id.index()] else {
                    unreachable!()
                };
                if terminal.precedence.is_some() {
                    return Err(GrammarDefError::DuplicatePrecedence { name: name.clone() });
                }
                terminal.precedence.replace(prec);
            }
        }

        let mut productions = Vec::with_capacity(self.rules.len() + 1);
        // terminals referenced only through `%prec`.
        let mut prec_markers = vec![];
        for (i, rule) in self.rules.iter().enumerate() {
            let left = nonterminal_ids[&*rule.left];
            let mut right = Vec::with_capacity(rule.right.len());
            for (name, symbol) in &rule.right {
                let symbol = match (
                    terminal_ids.get(&**symbol),
                    nonterminal_ids.get(&**symbol),
                ) {
                    (Some(t), None) => SymbolID::T(*t),
                    (None, Some(n)) => SymbolID::N(*n),
                    (Some(..), Some(..)) => {
                        return Err(GrammarDefError::AmbiguousSymbol {
                            name: symbol.clone(),
                        })
                    }
                    (None, None) => {
                        return Err(GrammarDefError::UnknownSymbol {
                            name: symbol.clone(),
                            referrer: format!("a rule of `{}'", rule.left),
                        })
                    }
                };
                right.push(RhsItem {
                    name: name.clone(),
                    symbol,
                });
            }

            let precedence = match &rule.precedence {
                Some(name) => {
                    let id = terminal_ids.get(&**name).copied().ok_or_else(|| {
                        GrammarDefError::UnknownSymbol {
                            name: name.clone(),
                            referrer: format!("the precedence of a rule of `{}'", rule.left),
                        }
                    })?;
                    prec_markers.push(id);
                    terminal_precedence(&symbols, id)
                }
                // the rightmost terminal decides, even if it has no precedence.
                None => right
                    .iter()
                    .rev()
                    .find_map(|item| match item.symbol {
                        SymbolID::T(t) => Some(terminal_precedence(&symbols, t)),
                        SymbolID::N(..) => None,
                    })
                    .flatten(),
            };

            let same_rule = |p: &Production| {
                p.left == left
                    && (p.right.iter().map(|r| r.symbol)).eq(right.iter().map(|r| r.symbol))
            };
            if productions.iter().any(same_rule) {
                return Err(GrammarDefError::DuplicateProduction {
                    left: rule.left.clone(),
                });
            }

            productions.push(Production {
                id: ProductionID::from_raw(i as u16),
                name: rule.name.clone(),
                left,
                right,
                precedence,
            });
        }

        let goal = match &self.start {
            Some(name) => nonterminal_ids
                .get(&**name)
                .copied()
                .filter(|n| *n != error)
                .ok_or_else(|| GrammarDefError::UnknownSymbol {
                    name: name.clone(),
                    referrer: "the start symbol declaration".into(),
                })?,
            None => productions
                .first()
                .map(|p| p.left)
                .ok_or(GrammarDefError::EmptyGrammar)?,
        };

        for p in &productions {
            let Symbol::Nonterminal(n) = &mut symbols[p.left.index()] else {
                unreachable!()
            };
            n.productions.push(p.id);
        }
        for symbol in &symbols[terminal_count..] {
            if let Symbol::Nonterminal(n) = symbol {
                if n.id != error && n.productions.is_empty() {
                    return Err(GrammarDefError::UndefinedSymbol {
                        name: n.name.clone(),
                    });
                }
            }
        }

        // Add `$goal = Goal` unless the goal has a unique production that can
        // only be completed at the top level.
        let goal_rules = productions.iter().filter(|p| p.left == goal).count();
        let goal_on_right = productions
            .iter()
            .flat_map(|p| &p.right)
            .any(|item| item.symbol == SymbolID::N(goal));
        let augmented = goal_rules > 1 || goal_on_right;
        let accept_production = if augmented {
            let start = NonterminalID::from_raw(symbols.len() as u16);
            let id = ProductionID::from_raw(productions.len() as u16);
            productions.push(Production {
                id,
                name: None,
                left: start,
                right: vec![RhsItem {
                    name: None,
                    symbol: SymbolID::N(goal),
                }],
                precedence: None,
            });
            symbols.push(Symbol::Nonterminal(Nonterminal {
                id: start,
                name: GOAL_NAME.into(),
                productions: vec![id],
                nullable: false,
                first: TerminalSet::default(),
            }));
            id
        } else {
            productions
                .iter()
                .find(|p| p.left == goal)
                .map(|p| p.id)
                .ok_or(GrammarDefError::EmptyGrammar)?
        };

        let mut grammar = Grammar {
            symbols,
            productions,
            terminal_count,
            first_value_terminal,
            error,
            goal,
            accept_production,
            augmented,
            warnings: vec![],
        };

        let nullables = first_sets::nullables(&grammar);
        for n in nullables {
            grammar.nonterminal_mut(n).nullable = true;
        }
        let firsts = first_sets::first_sets(&grammar);
        for (n, first) in firsts {
            grammar.nonterminal_mut(n).first = first;
        }

        grammar.warnings = usage_warnings(&grammar, &prec_markers);
        for warning in &grammar.warnings {
            tracing::warn!("{}", warning);
        }

        Ok(grammar)
    }
}

fn terminal_precedence(symbols: &[Symbol], id: TerminalID) -> Option<Precedence> {
    match &symbols[id.index()] {
        Symbol::Terminal(t) => t.precedence,
        Symbol::Nonterminal(..) => None,
    }
}

fn usage_warnings(g: &Grammar, prec_markers: &[TerminalID]) -> Vec<GrammarWarning> {
    let mut warnings = vec![];

    let mut used = vec![false; g.symbol_count()];
    for t in prec_markers {
        used[t.index()] = true;
    }
    for p in g.productions() {
        for item in p.right() {
            used[item.symbol.index()] = true;
        }
    }
    for t in g.terminals() {
        if t.id() != TerminalID::EOF && !used[t.id().index()] {
            warnings.push(GrammarWarning::UnusedTerminal {
                name: t.name().into(),
            });
        }
    }

    let mut reachable = vec![false; g.symbol_count()];
    let mut stack = vec![g.goal()];
    reachable[g.goal().index()] = true;
    while let Some(n) = stack.pop() {
        for &p in g.nonterminal(n).productions() {
            for item in g.production(p).right() {
                if let SymbolID::N(next) = item.symbol {
                    if !reachable[next.index()] {
                        reachable[next.index()] = true;
                        stack.push(next);
                    }
                }
            }
        }
    }
    let start = g.production(g.accept_production()).left();
    for n in g.nonterminals() {
        let id = n.id();
        if id == g.error_symbol() || id == start {
            continue;
        }
        if !reachable[id.index()] {
            warnings.push(GrammarWarning::UnreachableNonterminal {
                name: n.name().into(),
            });
        }
    }

    warnings
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GrammarDefError {
    #[error("`{name}' is not a valid symbol name")]
    InvalidName { name: String },

    #[error("`{name}' is reserved by the generator")]
    ReservedName { name: String },

    #[error("the terminal `{name}' has already been declared")]
    DuplicateTerminal { name: String },

    #[error("the nonterminal `{name}' has already been declared")]
    DuplicateNonterminal { name: String },

    #[error("`{name}' is declared both as a terminal and as a nonterminal")]
    AmbiguousSymbol { name: String },

    #[error("unknown symbol `{name}' referenced from {referrer}")]
    UnknownSymbol { name: String, referrer: String },

    #[error("the nonterminal `{name}' has no production rule")]
    UndefinedSymbol { name: String },

    #[error("the precedence of `{name}' is assigned more than once")]
    DuplicatePrecedence { name: String },

    #[error("duplicate production rule of `{left}'")]
    DuplicateProduction { left: String },

    #[error("the grammar has no production rules")]
    EmptyGrammar,

    #[error("too many symbols or production rules")]
    TooManySymbols,
}

fn verify_name(s: &str) -> Result<(), GrammarDefError> {
    let invalid = || GrammarDefError::InvalidName { name: s.into() };

    let mut chars = s.chars();
    // The identifier must be started with XID-Start.
    let first = chars.next().ok_or_else(invalid)?;
    if !(first == '_' || unicode_ident::is_xid_start(first)) {
        return Err(invalid());
    }
    // The idenfier must be continued with XID-Continue.
    if chars.any(|ch| !unicode_ident::is_xid_continue(ch)) {
        return Err(invalid());
    }
    if s == ERROR_NAME {
        return Err(GrammarDefError::ReservedName { name: s.into() });
    }

    Ok(())
}
