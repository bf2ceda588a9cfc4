use crate::genomics::GeneticConfig;
use crate::{Innovation, NodeId};

use ahash::RandomState;
use serde::{Deserialize, Serialize};

use std::collections::hash_map::{Entry, HashMap};

/// An `InnovationRegistry` keeps track of structural innovations
/// over the lifetime of a run, so that identical mutations are
/// assigned the same historical markers.
///
/// The mapping is keyed on the directed `(in, out)` node pair,
/// not on the generation, and is never pruned during a run:
/// two genomes that independently grow the same edge in any
/// generation receive the same innovation number, which lets
/// crossover align them later.
///
/// Each run owns exactly one registry, passed explicitly to the
/// operators that introduce structure. Access is serialized by
/// ownership; the registry is never shared between runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InnovationRegistry {
    innovations: HashMap<(NodeId, NodeId), Innovation, RandomState>,
    next_innovation: Innovation,
    next_node: NodeId,
    first_hidden: NodeId,
}

impl InnovationRegistry {
    /// Creates an empty registry for genomes with the given geometry.
    ///
    /// Node ids below `inputs + bias + outputs` are reserved for the
    /// fixed input, bias and output nodes; hidden node ids are handed
    /// out starting immediately after them.
    ///
    /// # Examples
    /// ```
    /// use neatcore::genomics::{GeneticConfig, InnovationRegistry};
    ///
    /// let mut registry = InnovationRegistry::new(&GeneticConfig::default());
    ///
    /// // inputs 0-2, bias 3, output 4: the first hidden node is 5.
    /// assert_eq!(registry.fresh_node(), 5);
    /// ```
    pub fn new(config: &GeneticConfig) -> InnovationRegistry {
        let first_hidden = config.io_node_count() as NodeId;
        InnovationRegistry {
            innovations: HashMap::default(),
            next_innovation: 1,
            next_node: first_hidden,
            first_hidden,
        }
    }

    /// Returns the innovation number for the directed edge
    /// `(in_node, out_node)`, assigning a fresh one if the pair
    /// has not been seen before in this run.
    ///
    /// # Examples
    /// ```
    /// use neatcore::genomics::{GeneticConfig, InnovationRegistry};
    ///
    /// let mut registry = InnovationRegistry::new(&GeneticConfig::default());
    ///
    /// let first = registry.innovation_for(4, 7);
    /// let second = registry.innovation_for(4, 7);
    ///
    /// assert_eq!(first, second);
    /// assert_ne!(first, registry.innovation_for(7, 4));
    /// ```
    pub fn innovation_for(&mut self, in_node: NodeId, out_node: NodeId) -> Innovation {
        match self.innovations.entry((in_node, out_node)) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let id = self.next_innovation;
                entry.insert(id);
                self.next_innovation += 1;
                id
            }
        }
    }

    /// Allocates a fresh hidden node id.
    pub fn fresh_node(&mut self) -> NodeId {
        let id = self.next_node;
        self.next_node += 1;
        id
    }

    /// Clears the mapping and resets both counters to their
    /// initial values, as at the start of a run.
    ///
    /// # Examples
    /// ```
    /// use neatcore::genomics::{GeneticConfig, InnovationRegistry};
    ///
    /// let mut registry = InnovationRegistry::new(&GeneticConfig::default());
    /// registry.innovation_for(0, 4);
    /// registry.innovation_for(1, 4);
    ///
    /// registry.reset();
    ///
    /// assert_eq!(registry.innovation_for(1, 4), 1);
    /// ```
    pub fn reset(&mut self) {
        self.innovations.clear();
        self.next_innovation = 1;
        self.next_node = self.first_hidden;
    }

    /// Returns a snapshot of the registry for checkpointing.
    pub fn snapshot(&self) -> InnovationRegistry {
        self.clone()
    }

    /// Restores the registry from a snapshot.
    pub fn restore(&mut self, snapshot: InnovationRegistry) {
        *self = snapshot;
    }

    /// Returns the highest innovation number assigned so far,
    /// or 0 if none has been.
    pub fn max_innovation(&self) -> Innovation {
        self.next_innovation - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> InnovationRegistry {
        InnovationRegistry::new(&GeneticConfig::default())
    }

    #[test]
    fn assignment_is_monotone_and_stable() {
        let mut registry = registry();
        let a = registry.innovation_for(0, 4);
        let b = registry.innovation_for(1, 4);
        let c = registry.innovation_for(2, 4);
        assert_eq!((a, b, c), (1, 2, 3));
        // Re-querying any pair returns the original id.
        assert_eq!(registry.innovation_for(1, 4), 2);
        assert_eq!(registry.max_innovation(), 3);
    }

    #[test]
    fn fresh_nodes_start_after_io_ids() {
        let mut registry = registry();
        assert_eq!(registry.fresh_node(), 5);
        assert_eq!(registry.fresh_node(), 6);
    }

    #[test]
    fn reset_restarts_both_counters() {
        let mut registry = registry();
        registry.innovation_for(4, 7);
        registry.fresh_node();
        registry.reset();
        assert_eq!(registry.innovation_for(4, 7), 1);
        assert_eq!(registry.fresh_node(), 5);
    }

    #[test]
    fn snapshot_round_trips() {
        let mut registry = registry();
        registry.innovation_for(0, 4);
        registry.fresh_node();
        let snapshot = registry.snapshot();

        registry.innovation_for(1, 4);
        registry.restore(snapshot);

        assert_eq!(registry.max_innovation(), 1);
        assert_eq!(registry.innovation_for(1, 4), 2);
    }
}
