//! LALR items and item sets.

use crate::{
    automaton::StateID,
    first_sets,
    grammar::{Grammar, ProductionID, SymbolID, TerminalSet},
    lookahead::EmitterGraph,
    types::{Map, Set},
    util::{display_fn, get_two_mut},
};
use std::{
    fmt,
    ops::{Index, IndexMut},
};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ItemID {
    raw: u32,
}

impl ItemID {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Debug for ItemID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I#{:04}", self.raw)
    }
}

/// The identity of an item: a production with a marker position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Core {
    pub production: ProductionID,
    pub dot: u16,
}

impl Core {
    pub const fn new(production: ProductionID, dot: u16) -> Self {
        Self { production, dot }
    }

    /// The symbol just after the marker, if any.
    pub fn next_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        g.production(self.production).symbol_at(self.dot as usize)
    }

    /// Symbols after the one following the marker.
    pub fn rest(&self, g: &Grammar) -> Vec<SymbolID> {
        let right = g.production(self.production).right();
        right
            .iter()
            .skip(self.dot as usize + 1)
            .map(|item| item.symbol)
            .collect()
    }

    pub fn is_final(&self, g: &Grammar) -> bool {
        self.dot as usize >= g.production(self.production).len()
    }

    pub const fn advance(self) -> Self {
        Self {
            production: self.production,
            dot: self.dot + 1,
        }
    }

    // `"E = E . PLUS T"`
    pub fn display<'g>(self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let production = g.production(self.production);
            write!(f, "{} =", g.nonterminal(production.left()).name())?;
            for (i, item) in production.right().iter().enumerate() {
                if i == self.dot as usize {
                    f.write_str(" .")?;
                }
                write!(f, " {}", g.symbol(item.symbol).name())?;
            }
            if self.is_final(g) {
                f.write_str(" .")?;
            }
            Ok(())
        })
    }
}

/// The kernel of an item set, which identifies a state.
///
/// The cores are deduplicated and sorted, so two kernels gathered in
/// different orders compare and hash equally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Kernel {
    cores: Vec<Core>,
}

impl Kernel {
    pub fn new<I>(cores: I) -> Self
    where
        I: IntoIterator<Item = Core>,
    {
        let cores: Set<Core> = cores.into_iter().collect();
        let mut cores: Vec<Core> = cores.into_iter().collect();
        cores.sort();
        Self { cores }
    }

    pub fn cores(&self) -> &[Core] {
        &self.cores
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }
}

#[derive(Debug)]
pub struct Item {
    pub core: Core,
    pub state: StateID,
    pub lookaheads: TerminalSet,
}

/// Storage of all items in an automaton, indexed by `ItemID`.
#[derive(Debug, Default)]
pub struct ItemArena {
    items: Vec<Item>,
}

impl ItemArena {
    pub fn alloc(&mut self, core: Core, state: StateID) -> ItemID {
        let id = ItemID::from_raw(self.items.len() as u32);
        self.items.push(Item {
            core,
            state,
            lookaheads: TerminalSet::default(),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemID, &Item)> + '_ {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (ItemID::from_raw(i as u32), item))
    }

    pub(crate) fn get_two_mut(&mut self, x: ItemID, y: ItemID) -> (&mut Item, &mut Item) {
        get_two_mut(&mut self.items, x.index(), y.index())
    }
}

impl Index<ItemID> for ItemArena {
    type Output = Item;
    fn index(&self, id: ItemID) -> &Self::Output {
        &self.items[id.index()]
    }
}

impl IndexMut<ItemID> for ItemArena {
    fn index_mut(&mut self, id: ItemID) -> &mut Self::Output {
        &mut self.items[id.index()]
    }
}

/// The items of a state: the kernel items followed by the closure items.
#[derive(Debug)]
pub struct ItemSet {
    kernel: Kernel,
    items: Vec<ItemID>,
}

impl ItemSet {
    /// Allocate the kernel items of a new state.
    pub(crate) fn new(kernel: Kernel, state: StateID, arena: &mut ItemArena) -> Self {
        let items = kernel
            .cores()
            .iter()
            .map(|core| arena.alloc(*core, state))
            .collect();
        Self { kernel, items }
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn items(&self) -> &[ItemID] {
        &self.items
    }

    pub fn kernel_items(&self) -> &[ItemID] {
        &self.items[..self.kernel.len()]
    }

    /// Find the kernel item with the specified core.
    pub fn kernel_item(&self, core: Core) -> Option<ItemID> {
        let i = self.kernel.cores.binary_search(&core).ok()?;
        Some(self.items[i])
    }

    /// Extend the kernel items with their closure.
    ///
    /// The spontaneous lookaheads `First(β)` are stored into the predicted
    /// items immediately, while the dependency on the lookaheads of the
    /// originating item is recorded as an emitter edge in `graph`.
    pub(crate) fn build_closure(
        &mut self,
        g: &Grammar,
        arena: &mut ItemArena,
        graph: &mut EmitterGraph,
    ) {
        let state = match self.items.first() {
            Some(&first) => arena[first].state,
            None => return,
        };

        let mut index: Map<Core, ItemID> = self
            .items
            .iter()
            .map(|&id| (arena[id].core, id))
            .collect();

        let mut pending = self.items.clone();
        while let Some(origin) = pending.pop() {
            let core = arena[origin].core;
            let Some(SymbolID::N(n)) = core.next_symbol(g) else {
                continue;
            };
            let contribution = first_sets::contribution(g, &core.rest(g));

            for &production in g.nonterminal(n).productions() {
                let predicted = Core::new(production, 0);
                let target = *index.entry(predicted).or_insert_with(|| {
                    let id = arena.alloc(predicted, state);
                    self.items.push(id);
                    pending.push(id);
                    id
                });
                arena[target].lookaheads.union_with(&contribution.first);
                if contribution.transparent {
                    graph.add_emitter(target, origin);
                }
            }
        }
    }

    pub fn display<'a>(&'a self, g: &'a Grammar, arena: &'a ItemArena) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            for (i, &id) in self.items.iter().enumerate() {
                let item = &arena[id];
                let marker = if i < self.kernel.len() { "*" } else { " " };
                write!(f, "{} [{}] {{", marker, item.core.display(g))?;
                for (j, t) in item.lookaheads.iter().enumerate() {
                    if j > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(g.terminal(t).name())?;
                }
                writeln!(f, "}}")?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar() -> Grammar {
        Grammar::define(|g| {
            g.terminal("A")?;
            g.terminal("B")?;
            g.rule("S", ["X", "X"])?;
            g.rule("X", ["A", "X"])?;
            g.rule("X", ["B"])?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn kernel_identity_ignores_order() {
        let p = |raw| ProductionID::from_raw(raw);
        let k1 = Kernel::new([Core::new(p(2), 1), Core::new(p(0), 1), Core::new(p(2), 1)]);
        let k2 = Kernel::new([Core::new(p(0), 1), Core::new(p(2), 1)]);
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 2);

        let mut kernels: Map<Kernel, usize> = Map::default();
        kernels.insert(k1, 0);
        assert_eq!(kernels.get(&k2), Some(&0));
    }

    #[test]
    fn closure_with_spontaneous_lookaheads() {
        let g = grammar();
        let t = |name| g.terminal_id(name).unwrap();

        let mut arena = ItemArena::default();
        let mut graph = EmitterGraph::default();
        let kernel = Kernel::new([Core::new(g.accept_production(), 0)]);
        let mut item_set = ItemSet::new(kernel, StateID::START, &mut arena);
        item_set.build_closure(&g, &mut arena, &mut graph);

        // S = . X X, X = . A X, X = . B
        assert_eq!(item_set.items().len(), 3);
        assert_eq!(item_set.kernel_items().len(), 1);
        for &id in &item_set.items()[1..] {
            let item = &arena[id];
            assert_eq!(item.core.dot, 0);
            assert_eq!(g.production(item.core.production).left(), g.nonterminal_id("X").unwrap());
            // First(X) is spontaneous, and `X` is not nullable.
            assert_eq!(item.lookaheads.iter().collect::<Vec<_>>(), [t("A"), t("B")]);
            assert!(graph.emitters(id).is_empty());
        }
    }

    #[test]
    fn closure_records_transparent_edges() {
        let g = Grammar::define(|g| {
            g.terminal("A")?;
            g.rule("S", ["S", "A"])?;
            g.rule("S", ["A"])?;
            Ok(())
        })
        .unwrap();
        assert!(g.is_augmented());

        let mut arena = ItemArena::default();
        let mut graph = EmitterGraph::default();
        let kernel = Kernel::new([Core::new(g.accept_production(), 0)]);
        let mut item_set = ItemSet::new(kernel, StateID::START, &mut arena);
        item_set.build_closure(&g, &mut arena, &mut graph);

        let start = item_set.kernel_items()[0];
        let predicted: Vec<_> = item_set.items()[1..].to_vec();
        assert_eq!(predicted.len(), 2);
        for id in predicted {
            // `$goal = . S` passes its lookaheads to both rules of `S`.
            assert_eq!(graph.emitters(id), [start]);
        }
        assert!(item_set.kernel_item(Core::new(g.accept_production(), 0)).is_some());
        assert!(item_set.kernel_item(Core::new(g.accept_production(), 1)).is_none());
    }
}
