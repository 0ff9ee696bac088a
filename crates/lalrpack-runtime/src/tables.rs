//! The packed parse tables.

use crate::definition::{ParseAction, ParseActionError, ParseTable};

/// The marker of an unused slot in `ParseTables::lookaheads`.
pub const EMPTY: u16 = u16::MAX;

/// The symbol id of the end of input.
pub const EOF: u16 = 0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProductionInfo {
    /// The symbol id of the left-hand side.
    pub lhs: u16,
    /// The number of symbols on the right-hand side.
    pub rhs_len: u16,
}

/// The action table in the shared-array layout.
///
/// The action of `state` on `symbol` is found at
/// `offsets[state * group_count + (symbol >> group_shift)] + symbol`, if
/// the control array `lookaheads` holds `symbol` at that index. Otherwise
/// the state has no explicit action, and terminals fall back to the
/// default reduction of the state.
///
/// Action codes are positive for shifts and gotos, `!production` for
/// reductions and zero for errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTables {
    pub terminal_count: u16,
    pub nonterminal_count: u16,
    /// Terminals with an id at or after this carry a semantic value.
    pub first_value_terminal: u16,
    /// The symbol id of the built-in `error` nonterminal.
    pub error_symbol: u16,
    /// The code of the accept action.
    pub accept_code: i32,
    pub productions: Vec<ProductionInfo>,
    pub actions: Vec<i32>,
    pub lookaheads: Vec<u16>,
    pub group_shift: u8,
    pub offsets: Vec<i32>,
    /// The default reduction code of each state, zero if absent.
    pub defaults: Vec<i32>,
}

impl ParseTables {
    pub fn symbol_count(&self) -> usize {
        self.terminal_count as usize + self.nonterminal_count as usize
    }

    pub fn state_count(&self) -> usize {
        self.defaults.len()
    }

    /// The number of symbol groups per state.
    pub fn group_count(&self) -> usize {
        match self.symbol_count() {
            0 => 0,
            n => ((n - 1) >> self.group_shift) + 1,
        }
    }

    pub fn is_terminal(&self, symbol: u16) -> bool {
        symbol < self.terminal_count
    }

    pub fn carries_value(&self, terminal: u16) -> bool {
        terminal >= self.first_value_terminal && terminal < self.terminal_count
    }

    /// Return the raw action code of `state` on `symbol`.
    pub fn lookup(&self, state: u32, symbol: u16) -> i32 {
        let state = state as usize;
        if state >= self.state_count() || symbol as usize >= self.symbol_count() {
            return 0;
        }
        let slot = state * self.group_count() + (symbol as usize >> self.group_shift);
        let index = self.offsets[slot] as i64 + symbol as i64;
        if index >= 0 {
            let index = index as usize;
            if self.lookaheads.get(index) == Some(&symbol) {
                return self.actions[index];
            }
        }
        if self.is_terminal(symbol) {
            self.defaults[state]
        } else {
            0
        }
    }

    /// Decode an action code.
    pub fn decode(&self, code: i32) -> ParseAction<u32, u16, u16> {
        if code > 0 {
            return ParseAction::Shift(code as u32);
        }
        if code == 0 {
            return ParseAction::Error(ParseActionError::IncorrectSymbol);
        }
        let production = !code as u16;
        let Some(info) = self.productions.get(production as usize) else {
            return ParseAction::Error(ParseActionError::IncorrectState);
        };
        if code == self.accept_code {
            ParseAction::Accept(production, info.rhs_len as usize)
        } else {
            ParseAction::Reduce(production, info.lhs, info.rhs_len as usize)
        }
    }

    /// The number of bytes `write_to` produces.
    pub fn serialized_size(&self) -> usize {
        crate::codec::HEADER_SIZE
            + self.productions.len() * 4
            + self.actions.len() * 4
            + self.lookaheads.len() * 2
            + self.offsets.len() * 4
            + self.defaults.len() * 4
    }
}

impl ParseTable for ParseTables {
    type State = u32;
    type Symbol = u16;
    type Reduce = u16;

    fn initial_state(&self) -> Self::State {
        0
    }

    fn action(
        &self,
        current: Self::State,
        lookahead: Option<Self::Symbol>,
    ) -> ParseAction<Self::State, Self::Symbol, Self::Reduce> {
        if current as usize >= self.state_count() {
            return ParseAction::Error(ParseActionError::IncorrectState);
        }
        let symbol = lookahead.unwrap_or(EOF);
        if !self.is_terminal(symbol) {
            return ParseAction::Error(ParseActionError::IncorrectSymbol);
        }
        self.decode(self.lookup(current, symbol))
    }

    fn goto(&self, current: Self::State, lhs: Self::Symbol) -> Option<Self::State> {
        if self.is_terminal(lhs) {
            return None;
        }
        match self.lookup(current, lhs) {
            code if code > 0 => Some(code as u32),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// S = A S | B  over the symbols `$eof`, `A`, `B`, `error`, `S`, `$goal`.
    pub(crate) fn sample() -> ParseTables {
        // state 0: A => s1, B => s2, S => g3
        // state 1: A => s1, B => s2, S => g4
        // state 2: default reduce S = B
        // state 3: $eof => accept
        // state 4: default reduce S = A S
        ParseTables {
            terminal_count: 3,
            nonterminal_count: 3,
            first_value_terminal: 1,
            error_symbol: 3,
            accept_code: !2,
            productions: vec![
                ProductionInfo { lhs: 4, rhs_len: 2 },
                ProductionInfo { lhs: 4, rhs_len: 1 },
                ProductionInfo { lhs: 5, rhs_len: 1 },
            ],
            actions: vec![0, 1, 2, !2, 3, 1, 2, 0, 4],
            lookaheads: vec![EMPTY, 1, 2, 0, 4, 1, 2, EMPTY, 4],
            group_shift: 3,
            offsets: vec![0, 4, -6, 3, -6],
            defaults: vec![0, 0, !1, 0, !0],
        }
    }

    #[test]
    fn lookup_with_defaults() {
        let tables = sample();
        assert_eq!(tables.group_count(), 1);
        assert_eq!(tables.lookup(0, 1), 1);
        assert_eq!(tables.lookup(0, 2), 2);
        assert_eq!(tables.lookup(0, 4), 3);
        assert_eq!(tables.lookup(0, 0), 0);
        assert_eq!(tables.lookup(3, 0), !2);
        // index 4 holds the goto of state 0, not an action of state 3.
        assert_eq!(tables.lookup(3, 1), 0);
        assert_eq!(tables.lookup(2, 0), !1);
        assert_eq!(tables.lookup(2, 2), !1);
        // nonterminals never take the default.
        assert_eq!(tables.lookup(2, 4), 0);
        // out of range
        assert_eq!(tables.lookup(9, 0), 0);
        assert_eq!(tables.lookup(0, 99), 0);
    }

    #[test]
    fn actions() {
        let tables = sample();
        assert_eq!(tables.action(0, Some(1)), ParseAction::Shift(1));
        assert_eq!(tables.action(4, None), ParseAction::Reduce(0, 4, 2));
        assert_eq!(tables.action(3, None), ParseAction::Accept(2, 1));
        assert_eq!(
            tables.action(3, Some(1)),
            ParseAction::Error(ParseActionError::IncorrectSymbol)
        );
        assert_eq!(
            tables.action(7, None),
            ParseAction::Error(ParseActionError::IncorrectState)
        );
        assert_eq!(tables.goto(1, 4), Some(4));
        assert_eq!(tables.goto(1, 1), None);
        assert!(tables.carries_value(1));
        assert!(!tables.carries_value(0));
    }
}
