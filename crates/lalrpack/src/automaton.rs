//! Construction of the LALR(1) automaton.

use crate::{
    grammar::{Grammar, SymbolID, TerminalID},
    item::{Core, Item, ItemArena, ItemID, ItemSet, Kernel},
    lookahead::{EmitterGraph, Propagator},
    types::Map,
    util::display_fn,
};
use std::{collections::VecDeque, fmt};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StateID {
    raw: u32,
}

impl StateID {
    /// The initial state of the automaton.
    pub const START: Self = Self::from_raw(0);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u32 {
        self.raw
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.raw)
    }
}

#[derive(Debug)]
pub struct State {
    id: StateID,
    item_set: ItemSet,
    transitions: Map<SymbolID, StateID>,
}

impl State {
    pub fn id(&self) -> StateID {
        self.id
    }

    pub fn item_set(&self) -> &ItemSet {
        &self.item_set
    }

    /// Shifts on terminals and gotos on nonterminals, in order of discovery.
    pub fn transitions(&self) -> &Map<SymbolID, StateID> {
        &self.transitions
    }
}

/// The canonical collection of LALR(1) states.
#[derive(Debug)]
pub struct Automaton {
    states: Vec<State>,
    items: ItemArena,
}

impl Automaton {
    /// Build the states and the emitter relation, leaving the lookaheads
    /// of every item as its spontaneous part.
    #[tracing::instrument(skip_all)]
    pub fn build(g: &Grammar) -> (Self, EmitterGraph) {
        let mut builder = Builder {
            g,
            states: vec![],
            items: ItemArena::default(),
            graph: EmitterGraph::default(),
            kernels: Map::default(),
            pending: VecDeque::new(),
        };
        builder.build();
        tracing::debug!(
            "{} states, {} items, {} emitter edges",
            builder.states.len(),
            builder.items.len(),
            builder.graph.edge_count()
        );
        let automaton = Self {
            states: builder.states,
            items: builder.items,
        };
        (automaton, builder.graph)
    }

    /// Build the automaton with the complete lookahead sets.
    pub fn compute(g: &Grammar) -> Self {
        let (mut automaton, graph) = Self::build(g);
        let mut propagator = Propagator::new(&graph, automaton.items.len());
        propagator.run(&mut automaton.items);
        automaton
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, id: StateID) -> &State {
        &self.states[id.index()]
    }

    pub fn items(&self) -> &ItemArena {
        &self.items
    }

    pub fn item(&self, id: ItemID) -> &Item {
        &self.items[id]
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for state in &self.states {
                writeln!(f, "#### State {:?}", state.id)?;
                writeln!(f, "## items:")?;
                write!(f, "{}", state.item_set.display(g, &self.items))?;
                if !state.transitions.is_empty() {
                    writeln!(f, "## transitions:")?;
                    for (symbol, to) in &state.transitions {
                        writeln!(f, "- {} => {:?}", g.symbol(*symbol).name(), to)?;
                    }
                }
                writeln!(f)?;
            }
            Ok(())
        })
    }
}

struct Builder<'g> {
    g: &'g Grammar,
    states: Vec<State>,
    items: ItemArena,
    graph: EmitterGraph,
    kernels: Map<Kernel, StateID>,
    pending: VecDeque<StateID>,
}

impl Builder<'_> {
    fn build(&mut self) {
        let start = Core::new(self.g.accept_production(), 0);
        let id = self.add_state(Kernel::new([start]));
        debug_assert_eq!(id, StateID::START);
        let start_item = self.states[id.index()].item_set.kernel_items()[0];
        self.items[start_item].lookaheads.insert(TerminalID::EOF);

        // Each state is taken from the queue exactly once.
        while let Some(id) = self.pending.pop_front() {
            self.build_shifts(id);
        }
    }

    fn add_state(&mut self, kernel: Kernel) -> StateID {
        let id = StateID::from_raw(self.states.len() as u32);
        let mut item_set = ItemSet::new(kernel.clone(), id, &mut self.items);
        item_set.build_closure(self.g, &mut self.items, &mut self.graph);
        self.states.push(State {
            id,
            item_set,
            transitions: Map::default(),
        });
        self.kernels.insert(kernel, id);
        self.pending.push_back(id);
        id
    }

    fn build_shifts(&mut self, id: StateID) {
        // symbol after the marker -> (advanced core -> source items)
        let mut successors: Map<SymbolID, Map<Core, Vec<ItemID>>> = Map::default();
        for &item in self.states[id.index()].item_set.items() {
            let core = self.items[item].core;
            if let Some(symbol) = core.next_symbol(self.g) {
                successors
                    .entry(symbol)
                    .or_default()
                    .entry(core.advance())
                    .or_default()
                    .push(item);
            }
        }

        for (symbol, moves) in successors {
            let kernel = Kernel::new(moves.keys().copied());
            let target = match self.kernels.get(&kernel) {
                Some(&target) => target,
                None => self.add_state(kernel),
            };

            // Merging into an existing state only appends emitter edges
            // to its kernel items.
            let target_set = &self.states[target.index()].item_set;
            for (core, &acceptor) in target_set.kernel().cores().iter().zip(target_set.kernel_items()) {
                for &emitter in moves.get(core).into_iter().flatten() {
                    self.graph.add_emitter(acceptor, emitter);
                }
            }

            self.states[id.index()].transitions.insert(symbol, target);
        }
    }
}
