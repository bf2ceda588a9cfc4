use crate::{Innovation, NodeId};

use serde::{Deserialize, Serialize};

use std::fmt;

/// Connection genes are the atomic units of heredity.
/// Each one encodes a weighted directed edge between two
/// nodes, tagged with the historical marker under which
/// the edge first appeared in the run.
///
/// Disabled genes stay in the genome so that crossover can
/// still align them against a partner, but they contribute
/// nothing to the phenotype.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ConnectionGene {
    pub(crate) innovation: Innovation,
    pub(crate) in_node: NodeId,
    pub(crate) out_node: NodeId,
    pub(crate) weight: f64,
    pub(crate) enabled: bool,
}

impl ConnectionGene {
    /// Returns a new _enabled_ gene with the specified parameters.
    ///
    /// # Examples
    /// ```
    /// use neatcore::genomics::ConnectionGene;
    ///
    /// let gene = ConnectionGene::new(42, 3, 9, 2.0);
    ///
    /// assert!(gene.enabled());
    /// ```
    pub fn new(innovation: Innovation, in_node: NodeId, out_node: NodeId, weight: f64) -> ConnectionGene {
        ConnectionGene {
            innovation,
            in_node,
            out_node,
            weight,
            enabled: true,
        }
    }

    /// Returns the gene's innovation number.
    pub fn innovation(&self) -> Innovation {
        self.innovation
    }

    /// Returns the id of the node the edge leaves from.
    pub fn in_node(&self) -> NodeId {
        self.in_node
    }

    /// Returns the id of the node the edge arrives at.
    pub fn out_node(&self) -> NodeId {
        self.out_node
    }

    /// Returns the gene's weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Returns whether the gene is expressed in the phenotype.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Marks the gene as disabled.
    ///
    /// # Examples
    /// ```
    /// use neatcore::genomics::ConnectionGene;
    ///
    /// let mut gene = ConnectionGene::new(42, 3, 9, 2.0);
    /// gene.disable();
    ///
    /// assert!(!gene.enabled());
    /// ```
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Returns the gene's endpoints as an `(in, out)` pair.
    pub(crate) fn endpoints(&self) -> (NodeId, NodeId) {
        (self.in_node, self.out_node)
    }
}

impl fmt::Display for ConnectionGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:?}[{:?}->{:?}, {:.3}]{}",
            if self.enabled { "" } else { "(" },
            self.innovation,
            self.in_node,
            self.out_node,
            self.weight,
            if self.enabled { "" } else { ")" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_gene_is_enabled() {
        let gene = ConnectionGene::new(7, 0, 4, -1.5);
        assert_eq!(gene.innovation(), 7);
        assert_eq!(gene.endpoints(), (0, 4));
        assert_eq!(gene.weight(), -1.5);
        assert!(gene.enabled());
    }

    #[test]
    fn display_marks_disabled_genes() {
        let mut gene = ConnectionGene::new(3, 1, 2, 0.25);
        assert_eq!(gene.to_string(), "3[1->2, 0.250]");
        gene.disable();
        assert_eq!(gene.to_string(), "(3[1->2, 0.250])");
    }
}
