//! Propagation of lookahead sets between items.

use crate::item::{ItemArena, ItemID};
use bit_vec::BitVec;

/// The emitter relation between items.
///
/// An emitter passes all of its lookaheads to its acceptor: a closure item
/// receives them from the item that predicted it through a nullable suffix,
/// and a kernel item from the item it was shifted from.
#[derive(Debug, Default)]
pub struct EmitterGraph {
    emitters: Vec<Vec<ItemID>>,
    edge_count: usize,
}

impl EmitterGraph {
    /// Record that `emitter` contributes its lookaheads to `acceptor`.
    ///
    /// Self loops and duplicated edges are ignored.
    pub fn add_emitter(&mut self, acceptor: ItemID, emitter: ItemID) -> bool {
        if acceptor == emitter {
            return false;
        }
        if self.emitters.len() <= acceptor.index() {
            self.emitters.resize_with(acceptor.index() + 1, Vec::new);
        }
        let emitters = &mut self.emitters[acceptor.index()];
        if emitters.contains(&emitter) {
            return false;
        }
        emitters.push(emitter);
        self.edge_count += 1;
        true
    }

    pub fn emitters(&self, acceptor: ItemID) -> &[ItemID] {
        self.emitters
            .get(acceptor.index())
            .map_or(&[], |emitters| &emitters[..])
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

/// Runs the emitter relation to a fixed point.
#[derive(Debug)]
pub struct Propagator {
    acceptors: Vec<Vec<ItemID>>,
    contributed: BitVec,
}

impl Propagator {
    pub fn new(graph: &EmitterGraph, item_count: usize) -> Self {
        let mut acceptors = vec![vec![]; item_count];
        for (acceptor, emitters) in graph.emitters.iter().enumerate() {
            for emitter in emitters {
                acceptors[emitter.index()].push(ItemID::from_raw(acceptor as u32));
            }
        }
        Self {
            acceptors,
            contributed: BitVec::from_elem(item_count, false),
        }
    }

    pub fn acceptors(&self, emitter: ItemID) -> &[ItemID] {
        &self.acceptors[emitter.index()]
    }

    /// Propagate the lookaheads until no set grows, and return the number of rounds.
    #[tracing::instrument(skip_all)]
    pub fn run(&mut self, items: &mut ItemArena) -> usize {
        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut changed = false;
            for emitter in 0..self.acceptors.len() {
                if self.contributed[emitter] {
                    continue;
                }
                self.contributed.set(emitter, true);

                let emitter = ItemID::from_raw(emitter as u32);
                for &acceptor in &self.acceptors[emitter.index()] {
                    let (source, target) = items.get_two_mut(emitter, acceptor);
                    if target.lookaheads.union_with(&source.lookaheads) {
                        // The acceptor has to contribute its new lookaheads again.
                        self.contributed.set(acceptor.index(), false);
                        changed = true;
                    }
                }
            }
            tracing::trace!("round {}: changed={}", rounds, changed);
            if !changed {
                break;
            }
        }
        tracing::debug!("lookaheads settled after {} rounds", rounds);
        rounds
    }
}
