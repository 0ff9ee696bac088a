//! Compression of the action table into the shared-array layout.

use crate::{
    automaton::StateID,
    grammar::{Grammar, ProductionID, SymbolID},
    table::{Action, ActionTable, Row},
    types::Map,
};
use lalrpack_runtime::{ParseTables, ProductionInfo, EMPTY};
use std::{cmp::Reverse, mem};

const ENTRY_WIDTH: usize = mem::size_of::<i32>() + mem::size_of::<u16>();
const OFFSET_WIDTH: usize = mem::size_of::<i32>();

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CompressionError {
    #[error("no offset is available for a group of {state:?}")]
    NoPlacement { state: StateID },

    #[error("the packed action array exceeds the addressable range")]
    TooLarge,

    #[error("unsound lookup in {state:?} on symbol #{symbol}: expected {expected}, found {found}")]
    Unsound {
        state: StateID,
        symbol: u16,
        expected: i32,
        found: i32,
    },
}

#[derive(Debug, Copy, Clone)]
pub struct CompressOptions {
    /// Split off the most frequent reduction of each state.
    pub default_reductions: bool,
    /// Search for a finer group size after the single-group packing.
    pub refine: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            default_reductions: true,
            refine: true,
        }
    }
}

/// Pack the action table into `ParseTables`.
///
/// The default reductions chosen here are written back into `table`.
#[tracing::instrument(skip_all)]
pub fn compress(
    g: &Grammar,
    table: &mut ActionTable,
    options: CompressOptions,
) -> Result<ParseTables, CompressionError> {
    if options.default_reductions {
        for row in table.rows_mut() {
            row.default_reduce = default_reduce(row);
        }
    }

    let rows: Vec<Vec<(u16, i32)>> = table.rows().iter().map(|row| entries(g, row)).collect();
    let symbol_count = g.symbol_count();

    let widest = ceil_log2(symbol_count);
    let mut best = pack(&rows, symbol_count, widest)?;
    tracing::debug!("single group: {} entries, {} bytes", best.actions.len(), best.size());
    if options.refine {
        let mut shift = widest;
        while shift > 0 {
            shift -= 1;
            let candidate = pack(&rows, symbol_count, shift)?;
            tracing::debug!(
                "group size 2^{}: {} entries, {} bytes",
                shift,
                candidate.actions.len(),
                candidate.size()
            );
            if candidate.size() >= best.size() {
                break;
            }
            best = candidate;
        }
    }

    let tables = ParseTables {
        terminal_count: g.terminal_count() as u16,
        nonterminal_count: g.nonterminal_count() as u16,
        first_value_terminal: g.first_value_terminal().into_raw(),
        error_symbol: g.error_symbol().into_raw(),
        accept_code: Action::Accept.code(g),
        productions: g
            .productions()
            .iter()
            .map(|p| ProductionInfo {
                lhs: p.left().into_raw(),
                rhs_len: p.len() as u16,
            })
            .collect(),
        actions: best.actions,
        lookaheads: best.lookaheads,
        group_shift: best.shift,
        offsets: best.offsets,
        defaults: table
            .rows()
            .iter()
            .map(|row| row.default_reduce.map_or(0, |p| Action::Reduce(p).code(g)))
            .collect(),
    };

    verify_lookups(g, table, &tables)?;

    Ok(tables)
}

/// The most frequent reduction of a row, the first-declared one on ties.
fn default_reduce(row: &Row) -> Option<ProductionID> {
    let mut counts: Map<ProductionID, usize> = Map::default();
    for (symbol, action) in &row.actions {
        if let (SymbolID::T(..), Action::Reduce(p)) = (symbol, action) {
            *counts.entry(*p).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by_key(|&(p, count)| (count, Reverse(p)))
        .map(|(p, _)| p)
}

/// The explicit `(symbol, code)` pairs of a row, without the entries
/// covered by its default reduction.
fn entries(g: &Grammar, row: &Row) -> Vec<(u16, i32)> {
    row.actions
        .iter()
        .filter(|(symbol, action)| match (symbol, action, row.default_reduce) {
            (SymbolID::T(..), Action::Reduce(p), Some(default)) => *p != default,
            _ => true,
        })
        .map(|(symbol, action)| (symbol.index() as u16, action.code(g)))
        .collect()
}

fn ceil_log2(n: usize) -> u8 {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as u8
    }
}

#[derive(Debug)]
struct Packing {
    shift: u8,
    actions: Vec<i32>,
    lookaheads: Vec<u16>,
    offsets: Vec<i32>,
}

impl Packing {
    fn size(&self) -> usize {
        self.actions.len() * ENTRY_WIDTH + self.offsets.len() * OFFSET_WIDTH
    }
}

/// A sub-vector of a row restricted to the symbol range `lo..hi`.
#[derive(Debug)]
struct Group<'a> {
    entries: &'a [(u16, i32)],
    lo: usize,
    hi: usize,
}

impl Group<'_> {
    fn contains(&self, symbol: u16) -> bool {
        self.entries
            .binary_search_by_key(&symbol, |(s, _)| *s)
            .is_ok()
    }

    fn covers(&self, symbol: u16) -> bool {
        (self.lo..self.hi).contains(&(symbol as usize))
    }
}

fn pack(rows: &[Vec<(u16, i32)>], symbol_count: usize, shift: u8) -> Result<Packing, CompressionError> {
    let group_count = ((symbol_count - 1) >> shift) + 1;
    let range = |group: usize| {
        let lo = group << shift;
        let hi = usize::min((group + 1) << shift, symbol_count);
        (lo, hi)
    };

    let mut offsets = vec![0; rows.len() * group_count];

    // identical sub-vectors share one placement.
    let mut uniques: Map<&[(u16, i32)], Vec<usize>> = Map::default();
    for (state, row) in rows.iter().enumerate() {
        let mut start = 0;
        for group in 0..group_count {
            let (_, hi) = range(group);
            let len = row[start..]
                .iter()
                .take_while(|(symbol, _)| (*symbol as usize) < hi)
                .count();
            let sub = &row[start..start + len];
            start += len;

            let slot = state * group_count + group;
            if sub.is_empty() {
                // every index in the range becomes negative and misses.
                offsets[slot] = -(hi as i32);
            } else {
                uniques.entry(sub).or_default().push(slot);
            }
        }
    }

    let mut groups: Vec<(&[(u16, i32)], Vec<usize>)> = uniques.into_iter().collect();
    groups.sort_by_key(|(entries, _)| Reverse(entries.len()));

    let mut packer = Packer::default();
    for (entries, slots) in groups {
        let (lo, hi) = range(slots[0] % group_count);
        let offset = packer
            .place(Group { entries, lo, hi })
            .ok_or(CompressionError::NoPlacement {
                state: StateID::from_raw((slots[0] / group_count) as u32),
            })?;
        let offset = i32::try_from(offset).map_err(|_| CompressionError::TooLarge)?;
        for slot in slots {
            offsets[slot] = offset;
        }
    }

    Ok(Packing {
        shift,
        actions: packer.actions,
        lookaheads: packer.lookaheads,
        offsets,
    })
}

#[derive(Debug, Default)]
struct Packer<'a> {
    actions: Vec<i32>,
    lookaheads: Vec<u16>,
    placed: Map<i64, Vec<Group<'a>>>,
}

impl<'a> Packer<'a> {
    /// Find the lowest offset for the group and write its entries there.
    fn place(&mut self, group: Group<'a>) -> Option<i64> {
        // past both the array and every used offset, the group always fits.
        let limit = self
            .placed
            .keys()
            .map(|o| o + 1)
            .fold(self.lookaheads.len() as i64, i64::max);
        let mut offset = -(group.lo as i64);
        while offset <= limit {
            if let Some(written) = self.try_place(&group, offset) {
                if self.verify(&group, offset) {
                    self.placed.entry(offset).or_default().push(group);
                    return Some(offset);
                }
                self.rollback(&written);
            }
            offset += 1;
        }
        None
    }

    /// Write the entries at `offset` if every slot is empty or already holds
    /// the identical pair, and return the newly written indices.
    fn try_place(&mut self, group: &Group<'_>, offset: i64) -> Option<Vec<usize>> {
        let mut written = vec![];
        for &(symbol, code) in group.entries {
            let index = (offset + symbol as i64) as usize;
            if index >= self.lookaheads.len() {
                self.lookaheads.resize(index + 1, EMPTY);
                self.actions.resize(index + 1, 0);
            }
            match self.lookaheads[index] {
                EMPTY => {
                    self.lookaheads[index] = symbol;
                    self.actions[index] = code;
                    written.push(index);
                }
                s if s == symbol && self.actions[index] == code => (),
                _ => {
                    self.rollback(&written);
                    return None;
                }
            }
        }
        Some(written)
    }

    /// Check that no group reads an entry it does not own.
    fn verify(&self, group: &Group<'_>, offset: i64) -> bool {
        // An entry stored for symbol `c` is only hit through an offset `o`
        // with `o + c == index`, so collisions only occur at the same offset.
        for c in group.lo..group.hi {
            let index = offset + c as i64;
            if index < 0 || index as usize >= self.lookaheads.len() {
                continue;
            }
            let stored = self.lookaheads[index as usize];
            if stored as usize == c && !group.contains(stored) {
                return false;
            }
        }

        let others = self.placed.get(&offset).into_iter().flatten();
        for other in others {
            for &(symbol, _) in group.entries {
                if other.covers(symbol) && !other.contains(symbol) {
                    return false;
                }
            }
        }

        true
    }

    fn rollback(&mut self, written: &[usize]) {
        for &index in written {
            self.lookaheads[index] = EMPTY;
            self.actions[index] = 0;
        }
        while self.lookaheads.last() == Some(&EMPTY) {
            self.lookaheads.pop();
            self.actions.pop();
        }
    }
}

/// Compare every lookup of the packed tables with the uncompressed rows.
fn verify_lookups(
    g: &Grammar,
    table: &ActionTable,
    tables: &ParseTables,
) -> Result<(), CompressionError> {
    for (i, row) in table.rows().iter().enumerate() {
        let state = StateID::from_raw(i as u32);
        for symbol in g.symbols().iter().map(|s| s.id()) {
            let expected = match row.get(symbol) {
                Some(action) => action.code(g),
                None => match (symbol, row.default_reduce) {
                    (SymbolID::T(..), Some(p)) => Action::Reduce(p).code(g),
                    _ => 0,
                },
            };
            let raw = symbol.index() as u16;
            let found = tables.lookup(state.into_raw(), raw);
            if found != expected {
                return Err(CompressionError::Unsound {
                    state,
                    symbol: raw,
                    expected,
                    found,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        automaton::Automaton,
        table::{self, ConflictPolicy},
    };

    fn lookup(p: &Packing, symbol_count: usize, state: usize, symbol: u16) -> i32 {
        let group_count = ((symbol_count - 1) >> p.shift) + 1;
        let group = (symbol >> p.shift) as usize;
        let index = p.offsets[state * group_count + group] as i64 + symbol as i64;
        if index >= 0 && (index as usize) < p.lookaheads.len() && p.lookaheads[index as usize] == symbol {
            p.actions[index as usize]
        } else {
            0
        }
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(5), 3);
        assert_eq!(ceil_log2(8), 3);
        assert_eq!(ceil_log2(9), 4);
    }

    #[test]
    fn foreign_lookahead_is_not_read() {
        let rows = vec![vec![(1, 10)], vec![(2, 20)]];
        let packing = pack(&rows, 4, 2).unwrap();
        // both rows would fit at offset 0, but the second row would then
        // find the entry of the first one on symbol 1.
        assert_eq!(packing.offsets, [0, 1]);
        for symbol in 0..4 {
            let expected = |row: &[(u16, i32)]| {
                row.iter().find(|(s, _)| *s == symbol).map_or(0, |(_, c)| *c)
            };
            assert_eq!(lookup(&packing, 4, 0, symbol), expected(&rows[0]));
            assert_eq!(lookup(&packing, 4, 1, symbol), expected(&rows[1]));
        }
    }

    #[test]
    fn identical_groups_share_placement() {
        let rows = vec![vec![(0, -1), (3, 5)], vec![(0, -1), (3, 5)], vec![]];
        let packing = pack(&rows, 4, 2).unwrap();
        assert_eq!(packing.actions.len(), 4);
        assert_eq!(packing.offsets[0], packing.offsets[1]);
        // the empty row misses everywhere.
        assert_eq!(packing.offsets[2], -4);
        for symbol in 0..4 {
            assert_eq!(lookup(&packing, 4, 2, symbol), 0);
        }
    }

    #[test]
    fn overlapping_rows_are_separated() {
        let rows = vec![vec![(0, 1), (2, 2)], vec![(1, 3), (3, 4)]];
        let packing = pack(&rows, 4, 2).unwrap();
        // offset 0 exposes (0, 1) to the second row, offset 1 collides at index 2.
        assert_eq!(packing.offsets, [0, 2]);
        assert_eq!(packing.lookaheads, [0, EMPTY, 2, 1, EMPTY, 3]);
        assert_eq!(lookup(&packing, 4, 0, 1), 0);
        assert_eq!(lookup(&packing, 4, 1, 1), 3);
        assert_eq!(lookup(&packing, 4, 1, 0), 0);
    }

    #[test]
    fn default_reduce_is_most_frequent() {
        let p = ProductionID::from_raw;
        let t = |raw| SymbolID::T(crate::grammar::TerminalID::from_raw(raw));
        let row = Row {
            actions: vec![
                (t(0), Action::Reduce(p(4))),
                (t(1), Action::Reduce(p(2))),
                (t(2), Action::Reduce(p(4))),
                (t(3), Action::Reduce(p(2))),
                (t(4), Action::Accept),
            ],
            default_reduce: None,
        };
        assert_eq!(default_reduce(&row), Some(p(2)));

        let row = Row {
            actions: vec![(t(0), Action::Accept)],
            default_reduce: None,
        };
        assert_eq!(default_reduce(&row), None);
    }

    #[test]
    fn compressed_tables_are_sound() {
        let g = Grammar::define(|g| {
            g.literal("PLUS", "+")?;
            g.literal("STAR", "*")?;
            g.literal("LPAREN", "(")?;
            g.literal("RPAREN", ")")?;
            g.terminal("NUM")?;
            g.rule("E", ["E", "PLUS", "T"])?;
            g.rule("E", ["T"])?;
            g.rule("T", ["T", "STAR", "F"])?;
            g.rule("T", ["F"])?;
            g.rule("F", ["NUM"])?;
            g.rule("F", ["LPAREN", "E", "RPAREN"])?;
            Ok(())
        })
        .unwrap();
        let automaton = Automaton::compute(&g);

        for options in [
            CompressOptions::default(),
            CompressOptions {
                default_reductions: false,
                refine: true,
            },
            CompressOptions {
                default_reductions: true,
                refine: false,
            },
        ] {
            let (mut table, conflicts) = table::build(&g, &automaton, ConflictPolicy::Report);
            assert!(conflicts.is_empty());
            let tables = compress(&g, &mut table, options).unwrap();
            assert_eq!(tables.state_count(), automaton.states().len());
            assert_eq!(tables.accept_code, !(g.accept_production().into_raw() as i32));
            if !options.refine {
                assert_eq!(tables.group_count(), 1);
            }
            if !options.default_reductions {
                assert!(tables.defaults.iter().all(|&d| d == 0));
            }
        }
    }
}
