//! Parser definition.

/// The trait for abstracting the generated LALR(1) parse table.
pub trait ParseTable {
    /// The number to identify the state of LR automaton.
    type State: Copy;

    /// The number to identify the terminal/nonterminal symbols.
    type Symbol: Copy;

    /// The context value corresponding to the matched production rule.
    type Reduce;

    /// Return the initial state number.
    fn initial_state(&self) -> Self::State;

    /// Return the action corresponding to the specified state number and
    /// lookahead symbol.
    ///
    /// If there is no lookahead symbol, a `None` is passsed as the end of input.
    fn action(
        &self,
        current: Self::State,
        lookahead: Option<Self::Symbol>,
    ) -> ParseAction<Self::State, Self::Symbol, Self::Reduce>;

    /// Return the state to go after reducing to the nonterminal `lhs`.
    fn goto(&self, current: Self::State, lhs: Self::Symbol) -> Option<Self::State>;
}

impl<T: ?Sized> ParseTable for &T
where
    T: ParseTable,
{
    type State = T::State;
    type Symbol = T::Symbol;
    type Reduce = T::Reduce;

    fn initial_state(&self) -> Self::State {
        (**self).initial_state()
    }

    fn action(
        &self,
        current: Self::State,
        lookahead: Option<Self::Symbol>,
    ) -> ParseAction<Self::State, Self::Symbol, Self::Reduce> {
        (**self).action(current, lookahead)
    }

    fn goto(&self, current: Self::State, lhs: Self::Symbol) -> Option<Self::State> {
        (**self).goto(current, lhs)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseAction<TState, TSymbol, TReduce> {
    /// Read the lookahead symbol and transition to the specified state.
    Shift(TState),

    /// Pop the given number of symbols and reduce them to the nonterminal.
    Reduce(TReduce, TSymbol, usize),

    /// Reduce by the accept production and finish parsing.
    Accept(TReduce, usize),

    Error(ParseActionError),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseActionError {
    #[error("incorrect state")]
    IncorrectState,

    #[error("incorrect symbol")]
    IncorrectSymbol,
}
