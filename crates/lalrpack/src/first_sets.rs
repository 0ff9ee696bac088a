//! Calculation of nullable symbols and first sets.

use crate::{
    grammar::{Grammar, NonterminalID, SymbolID, TerminalSet},
    util::get_two_mut,
};

/// Calculate the set of nullable nonterminals in this grammar.
pub(crate) fn nullables(g: &Grammar) -> Vec<NonterminalID> {
    let mut nulls = vec![false; g.symbol_count()];

    // Repeat until no more nonterminals become nullable.
    let mut changed = true;
    while changed {
        changed = false;
        for p in g.productions() {
            if nulls[p.left().index()] {
                continue;
            }
            if p.right().iter().all(|item| nulls[item.symbol.index()]) {
                nulls[p.left().index()] = true;
                changed = true;
            }
        }
    }

    g.nonterminals()
        .map(|n| n.id())
        .filter(|n| nulls[n.index()])
        .collect()
}

/// Calculate the first sets of all nonterminals.
///
/// The nullable flags of the grammar must have been settled beforehand.
pub(crate) fn first_sets(g: &Grammar) -> Vec<(NonterminalID, TerminalSet)> {
    let offset = g.terminal_count();
    let mut sets = vec![TerminalSet::default(); g.nonterminal_count()];

    // For a rule `X -> Y1 Y2 ... Yn`, let Yk be the first non-nullable symbol.
    // Each of Y1..Yk contributes to First(X): a terminal directly, and a
    // nonterminal through the constraint `First(X) ⊇ First(Yi)`.
    struct Constraint {
        sup: usize,
        sub: usize,
    }
    let mut constraints = vec![];
    for p in g.productions() {
        let sup = p.left().index() - offset;
        for item in p.right() {
            match item.symbol {
                SymbolID::T(t) => {
                    sets[sup].insert(t);
                    break;
                }
                SymbolID::N(n) => {
                    let sub = n.index() - offset;
                    if sub != sup {
                        constraints.push(Constraint { sup, sub });
                    }
                    if !g.nonterminal(n).is_nullable() {
                        break;
                    }
                }
            }
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for Constraint { sup, sub } in &constraints {
            let (superset, subset) = get_two_mut(&mut sets, *sup, *sub);
            changed |= superset.union_with(subset);
        }
    }

    g.nonterminals().map(|n| n.id()).zip(sets).collect()
}

/// The lookaheads contributed by the rest of an item's right-hand side.
#[derive(Debug, Default)]
pub struct Contribution {
    /// `First(rest)`.
    pub first: TerminalSet,
    /// Whether `rest` derives the empty string, so that the lookaheads of
    /// the originating item also reach the predicted one.
    pub transparent: bool,
}

/// Compute the lookaheads that `rest` supplies to a predicted item.
pub fn contribution(g: &Grammar, rest: &[SymbolID]) -> Contribution {
    let mut first = TerminalSet::default();
    for symbol in rest {
        match symbol {
            SymbolID::T(t) => {
                first.insert(*t);
                return Contribution {
                    first,
                    transparent: false,
                };
            }
            SymbolID::N(n) => {
                let n = g.nonterminal(*n);
                first.union_with(n.first());
                if !n.is_nullable() {
                    return Contribution {
                        first,
                        transparent: false,
                    };
                }
            }
        }
    }
    Contribution {
        first,
        transparent: true,
    }
}
