//! Calculation of the action table with conflict resolution.

use crate::{
    automaton::{Automaton, StateID},
    grammar::{Assoc, Grammar, Precedence, ProductionID, SymbolID, TerminalID},
    types::Map,
    util::display_fn,
};
use std::{cmp::Ordering, fmt};

/// The action that the automaton in a state performs on a particular symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Shift a terminal, or go to a state after reducing to a nonterminal.
    Shift(StateID),

    /// Reduce to the specified production rule.
    Reduce(ProductionID),

    /// Reduce by the accept production on the end of input and stop.
    Accept,
}

impl Action {
    /// The integer code of this action in the emitted tables.
    ///
    /// Shifts are positive, reductions are the bitwise complement of the
    /// production id, and zero is reserved for errors.
    pub fn code(&self, g: &Grammar) -> i32 {
        match self {
            Self::Shift(next) => next.into_raw() as i32,
            Self::Reduce(p) => !(p.into_raw() as i32),
            Self::Accept => !(g.accept_production().into_raw() as i32),
        }
    }

    fn reduced(&self, g: &Grammar) -> Option<ProductionID> {
        match self {
            Self::Shift(..) => None,
            Self::Reduce(p) => Some(*p),
            Self::Accept => Some(g.accept_production()),
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| match self {
            Self::Shift(next) => write!(f, "shift({:?})", next),
            Self::Reduce(p) => write!(f, "reduce({})", g.production(*p).display(g)),
            Self::Accept => f.write_str("accept"),
        })
    }
}

/// The resolved actions of a state.
#[derive(Debug, Default)]
pub struct Row {
    /// The actions sorted by symbol id, gotos included.
    pub actions: Vec<(SymbolID, Action)>,
    /// The reduction performed on any terminal without an explicit action.
    pub default_reduce: Option<ProductionID>,
}

impl Row {
    pub fn get(&self, symbol: SymbolID) -> Option<Action> {
        self.actions
            .binary_search_by_key(&symbol, |(s, _)| *s)
            .ok()
            .map(|i| self.actions[i].1)
    }
}

#[derive(Debug)]
pub struct ActionTable {
    rows: Vec<Row>,
}

impl ActionTable {
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, state: StateID) -> &Row {
        &self.rows[state.index()]
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, row) in self.rows.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### State {:?}", StateID::from_raw(i as u32))?;
                writeln!(f, "## actions")?;
                for (symbol, action) in &row.actions {
                    let name = g.symbol(*symbol).name();
                    match (symbol, action) {
                        (SymbolID::N(..), Action::Shift(next)) => {
                            writeln!(f, "- {} => goto({:?})", name, next)?
                        }
                        _ => writeln!(f, "- {} => {}", name, action.display(g))?,
                    }
                }
                if let Some(p) = row.default_reduce {
                    writeln!(f, "## default")?;
                    writeln!(f, "- reduce({})", g.production(p).display(g))?;
                }
            }
            Ok(())
        })
    }
}

/// How an unresolved shift/reduce conflict is settled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Report the conflict; the shift is kept in the best-effort table.
    #[default]
    Report,
    /// Resolve the conflict in favor of the shift.
    PreferShift,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Neither precedence nor associativity decided the conflict.
    Unresolved,
    /// Decided in favor of the shift by `ConflictPolicy::PreferShift`.
    PreferShift,
}

/// A conflict on a lookahead symbol that precedences could not resolve.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub state: StateID,
    pub lookahead: TerminalID,
    /// The competing actions, the shift first.
    pub actions: Vec<Action>,
    pub kind: ConflictKind,
    pub resolution: Resolution,
}

impl Conflict {
    pub fn is_unresolved(&self) -> bool {
        self.resolution == Resolution::Unresolved
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let kind = match self.kind {
                ConflictKind::ShiftReduce => "shift/reduce",
                ConflictKind::ReduceReduce => "reduce/reduce",
            };
            write!(
                f,
                "{} conflict in {:?} on `{}'",
                kind,
                self.state,
                g.terminal(self.lookahead).name()
            )?;
            if self.resolution == Resolution::PreferShift {
                f.write_str(" (resolved as shift)")?;
            }
            writeln!(f)?;
            for action in &self.actions {
                writeln!(f, "  - {}", action.display(g))?;
            }
            Ok(())
        })
    }
}

/// Compute the actions of every state and resolve their conflicts.
#[tracing::instrument(skip_all)]
pub fn build(
    g: &Grammar,
    automaton: &Automaton,
    policy: ConflictPolicy,
) -> (ActionTable, Vec<Conflict>) {
    let mut rows = Vec::with_capacity(automaton.states().len());
    let mut conflicts = vec![];

    for state in automaton.states() {
        let mut pending: Map<TerminalID, Vec<Action>> = Map::default();
        let mut gotos = vec![];
        for (&symbol, &next) in state.transitions() {
            match symbol {
                SymbolID::T(t) => pending.entry(t).or_default().push(Action::Shift(next)),
                SymbolID::N(..) => gotos.push((symbol, Action::Shift(next))),
            }
        }
        for &id in state.item_set().items() {
            let item = automaton.item(id);
            if !item.core.is_final(g) {
                continue;
            }
            if item.core.production == g.accept_production() {
                // The accept item only ever sees the end of input.
                pending.entry(TerminalID::EOF).or_default().push(Action::Accept);
                continue;
            }
            for t in item.lookaheads.iter() {
                pending
                    .entry(t)
                    .or_default()
                    .push(Action::Reduce(item.core.production));
            }
        }

        let mut actions = gotos;
        for (t, mut candidates) in pending {
            if candidates.len() > 1 {
                if let Some(conflict) = resolve(g, state.id(), t, &mut candidates, policy) {
                    conflicts.push(conflict);
                }
            }
            debug_assert_eq!(candidates.len(), 1);
            actions.push((SymbolID::T(t), candidates[0]));
        }
        actions.sort_by_key(|(symbol, _)| *symbol);

        rows.push(Row {
            actions,
            default_reduce: None,
        });
    }

    for conflict in &conflicts {
        if conflict.is_unresolved() {
            tracing::warn!("{}", conflict.display(g));
        } else {
            tracing::debug!("{}", conflict.display(g));
        }
    }

    (ActionTable { rows }, conflicts)
}

/// Narrow the competing actions on `lookahead` down to one.
///
/// Returns the conflict record if the decision could not be made by precedences.
fn resolve(
    g: &Grammar,
    state: StateID,
    lookahead: TerminalID,
    candidates: &mut Vec<Action>,
    policy: ConflictPolicy,
) -> Option<Conflict> {
    // the shift first, then the reductions in declaration order.
    candidates.sort_by_key(|action| action.reduced(g).map(|p| p.into_raw()));
    let competing = candidates.clone();
    let has_shift = matches!(candidates[0], Action::Shift(..));
    let first_reduce = usize::from(has_shift);

    // reduce/reduce: the highest precedence wins, and it has to be unique.
    // On a tie at the top the first-declared of the tied reductions is kept.
    let mut unresolved_rr = false;
    let mut winner = first_reduce;
    for i in first_reduce + 1..candidates.len() {
        let best = reduce_precedence(g, &candidates[winner]);
        let other = reduce_precedence(g, &candidates[i]);
        match compare_precs(best, other) {
            Some(Ordering::Less) => {
                winner = i;
                unresolved_rr = false;
            }
            Some(Ordering::Greater) => (),
            Some(Ordering::Equal) | None => unresolved_rr = true,
        }
    }
    for i in (first_reduce..candidates.len()).rev() {
        if i != winner {
            candidates.remove(i);
        }
    }

    // shift/reduce between the shift and the remaining reduction.
    let mut unresolved_sr = false;
    if has_shift && candidates.len() == 2 {
        let shift_prec = g.terminal(lookahead).precedence();
        let reduce_prec = reduce_precedence(g, &candidates[1]);
        let keep_shift = match compare_precs(shift_prec, reduce_prec) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Less) => false,
            Some(Ordering::Equal) => match shift_prec.map(|p| p.assoc) {
                Some(Assoc::Left) => false,
                Some(Assoc::Right) => true,
                _ => {
                    unresolved_sr = true;
                    true
                }
            },
            None => {
                unresolved_sr = true;
                true
            }
        };
        candidates.remove(if keep_shift { 1 } else { 0 });
    }

    let (kind, resolution) = match (unresolved_rr, unresolved_sr) {
        (false, false) => {
            tracing::trace!(
                "conflict in {:?} on `{}' resolved by precedence",
                state,
                g.terminal(lookahead).name()
            );
            return None;
        }
        (true, _) => (ConflictKind::ReduceReduce, Resolution::Unresolved),
        (false, true) => match policy {
            ConflictPolicy::PreferShift => (ConflictKind::ShiftReduce, Resolution::PreferShift),
            ConflictPolicy::Report => (ConflictKind::ShiftReduce, Resolution::Unresolved),
        },
    };

    Some(Conflict {
        state,
        lookahead,
        actions: competing,
        kind,
        resolution,
    })
}

fn reduce_precedence(g: &Grammar, action: &Action) -> Option<Precedence> {
    action
        .reduced(g)
        .and_then(|p| g.production(p).precedence())
}

/// Compare two precedences, where an undefined one is the lowest.
///
/// Returns `None` if neither is defined.
fn compare_precs(lhs: Option<Precedence>, rhs: Option<Precedence>) -> Option<Ordering> {
    match (lhs, rhs) {
        (Some(p1), Some(p2)) => Some(Ord::cmp(&p1.priority, &p2.priority)),
        (Some(..), None) => Some(Ordering::Greater),
        (None, Some(..)) => Some(Ordering::Less),
        (None, None) => None,
    }
}

/// Collect the productions that no reduce or accept action refers to.
pub fn unreducible_productions(g: &Grammar, table: &ActionTable) -> Vec<ProductionID> {
    let mut used = vec![false; g.productions().len()];
    for row in &table.rows {
        for (_, action) in &row.actions {
            if let Some(p) = action.reduced(g) {
                used[p.index()] = true;
            }
        }
        if let Some(p) = row.default_reduce {
            used[p.index()] = true;
        }
    }
    g.productions()
        .iter()
        .map(|p| p.id())
        .filter(|p| !used[p.index()])
        .collect()
}
