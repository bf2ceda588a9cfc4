//! A Network is the phenotype of a genome: a feed-forward
//! evaluator over the genome's enabled genes. Construction
//! classifies nodes by the roles recorded at genome creation,
//! produces a topological order, and caches per-node incoming
//! connection lists; activation is then a single pass over the
//! nodes in that order.
//!
//! Genomes stay acyclic under this crate's own operators, but a
//! crossover of two acyclic parents can still close a loop in the
//! union of their edges, so cycle handling is explicit: the
//! builder either deterministically drops the offending
//! back-edges or refuses the genome, per [`CyclePolicy`].

use crate::genomics::{Genome, NodeRole};
use crate::NodeId;

use ahash::RandomState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::collections::{BTreeSet, HashMap};

/// The activation function applied at every non-input node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ActivationType {
    /// `1 / (1 + exp(-4.9x))`, the steepened sigmoid.
    Sigmoid,
    /// `tanh(x)`
    Tanh,
    /// `max(0, x)`
    ReLU,
    /// `x`
    Identity,
}

/// How the builder treats a genome whose enabled genes contain
/// a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CyclePolicy {
    /// Deterministically drop the offending back-edges and
    /// build the rest of the network.
    Break,
    /// Refuse construction with [`NetworkError::CycleDetected`].
    Reject,
}

/// Errors surfaced by network construction and activation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The input vector's length disagrees with the genome's
    /// input node count.
    #[error("expected {expected} input values, got {got}")]
    InputArityMismatch { expected: usize, got: usize },
    /// The genome is not feed-forward and the builder was
    /// configured to reject cycles.
    #[error("genome contains a cycle among its enabled genes")]
    CycleDetected,
}

/// A feed-forward neural network compiled from a genome.
#[derive(Clone, Debug)]
pub struct Network {
    order: Vec<NodeId>,
    roles: Vec<NodeRole>,
    /// Incoming `(source position, weight)` pairs per node position.
    incoming: Vec<Vec<(usize, f64)>>,
    values: Vec<f64>,
    input_positions: Vec<usize>,
    output_positions: Vec<usize>,
    activation: ActivationType,
}

impl Network {
    /// Compiles a genome into a network, breaking any cycles.
    ///
    /// # Examples
    /// ```
    /// use neatcore::genomics::{ConnectionGene, Genome};
    /// use neatcore::networks::Network;
    ///
    /// let genome = Genome::from_genes(1, 1, false, vec![ConnectionGene::new(1, 0, 1, 1.0)]);
    /// let mut network = Network::create(&genome);
    ///
    /// let outputs = network.activate(&[0.5]).unwrap();
    /// assert!((outputs[0] - 1.0 / (1.0 + (-4.9f64 * 0.5).exp())).abs() < 1e-12);
    /// ```
    pub fn create(genome: &Genome) -> Network {
        match Network::with_policy(genome, CyclePolicy::Break) {
            Ok(network) => network,
            // Break always yields an order.
            Err(_) => unreachable!(),
        }
    }

    /// Compiles a genome into a network under the given cycle policy.
    ///
    /// # Errors
    /// Returns [`NetworkError::CycleDetected`] under
    /// [`CyclePolicy::Reject`] if the genome's enabled genes are
    /// not acyclic.
    pub fn with_policy(genome: &Genome, policy: CyclePolicy) -> Result<Network, NetworkError> {
        let nodes: Vec<NodeId> = genome.nodes().collect();
        let roles_by_id: HashMap<NodeId, NodeRole, RandomState> =
            nodes.iter().map(|&n| (n, genome.role(n))).collect();

        // Edges into inputs or the bias carry no meaning in a
        // feed-forward pass; drop them along with self-loops.
        let edges: Vec<(NodeId, NodeId, f64)> = genome
            .genes()
            .filter(|g| g.enabled() && g.in_node() != g.out_node())
            .filter(|g| {
                !matches!(
                    roles_by_id[&g.out_node()],
                    NodeRole::Input | NodeRole::Bias
                )
            })
            .map(|g| (g.in_node(), g.out_node(), g.weight()))
            .collect();

        let order = topological_order(&nodes, &edges, policy)?;
        let position: HashMap<NodeId, usize, RandomState> =
            order.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let mut incoming = vec![Vec::new(); order.len()];
        for &(s, t, weight) in &edges {
            let (from, to) = (position[&s], position[&t]);
            // Back-edges run against the order; they are exactly the
            // edges a Break build drops.
            if from < to {
                incoming[to].push((from, weight));
            }
        }

        let roles: Vec<NodeRole> = order.iter().map(|n| roles_by_id[n]).collect();
        let input_positions = (0..genome.input_count() as NodeId)
            .map(|id| position[&id])
            .collect();
        let output_positions = genome.output_ids().map(|id| position[&id]).collect();

        Ok(Network {
            values: vec![0.0; order.len()],
            order,
            roles,
            incoming,
            input_positions,
            output_positions,
            activation: ActivationType::Sigmoid,
        })
    }

    /// Replaces the default steepened sigmoid with another
    /// activation function.
    pub fn with_activation(mut self, activation: ActivationType) -> Network {
        self.activation = activation;
        self
    }

    /// Activates the network on an input vector, returning one
    /// value per output node in canonical output order.
    ///
    /// Inputs take their supplied values, the bias is pinned to
    /// 1.0, and every other node applies the activation function
    /// to the weighted sum of its enabled incoming connections.
    ///
    /// # Errors
    /// Returns [`NetworkError::InputArityMismatch`] if the slice
    /// length differs from the network's input node count.
    pub fn activate(&mut self, inputs: &[f64]) -> Result<Vec<f64>, NetworkError> {
        if inputs.len() != self.input_positions.len() {
            return Err(NetworkError::InputArityMismatch {
                expected: self.input_positions.len(),
                got: inputs.len(),
            });
        }

        self.values.fill(0.0);
        for (&position, &value) in self.input_positions.iter().zip(inputs) {
            self.values[position] = value;
        }

        for i in 0..self.order.len() {
            match self.roles[i] {
                NodeRole::Input => {}
                NodeRole::Bias => self.values[i] = 1.0,
                NodeRole::Output | NodeRole::Hidden => {
                    let raw: f64 = self.incoming[i]
                        .iter()
                        .map(|&(from, weight)| self.values[from] * weight)
                        .sum();
                    self.values[i] = apply(self.activation, raw);
                }
            }
        }

        Ok(self
            .output_positions
            .iter()
            .map(|&position| self.values[position])
            .collect())
    }

    /// Returns the number of input nodes, not counting the bias.
    pub fn input_count(&self) -> usize {
        self.input_positions.len()
    }

    /// Returns the number of output nodes.
    pub fn output_count(&self) -> usize {
        self.output_positions.len()
    }
}

/// Kahn's algorithm over the given edges, popping the smallest
/// ready node id first so the order is independent of edge
/// iteration order. When the graph has a cycle, `Break` unblocks
/// the smallest-id node lying on a cycle, discarding only that
/// node's unsatisfied incoming edges; `Reject` reports the cycle.
fn topological_order(
    nodes: &[NodeId],
    edges: &[(NodeId, NodeId, f64)],
    policy: CyclePolicy,
) -> Result<Vec<NodeId>, NetworkError> {
    let mut in_degree: HashMap<NodeId, usize, RandomState> =
        nodes.iter().map(|&n| (n, 0)).collect();
    let mut out_edges: HashMap<NodeId, Vec<NodeId>, RandomState> = HashMap::default();
    for &(s, t, _) in edges {
        *in_degree.get_mut(&t).unwrap() += 1;
        out_edges.entry(s).or_default().push(t);
    }

    let mut pending: BTreeSet<NodeId> = nodes.iter().copied().collect();
    let mut ready: BTreeSet<NodeId> = nodes
        .iter()
        .copied()
        .filter(|n| in_degree[n] == 0)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while order.len() < nodes.len() {
        let node = match ready.iter().next().copied() {
            Some(node) => node,
            None => match policy {
                CyclePolicy::Reject => return Err(NetworkError::CycleDetected),
                CyclePolicy::Break => smallest_cyclic_node(&pending, &out_edges),
            },
        };
        ready.remove(&node);
        pending.remove(&node);
        order.push(node);

        for target in out_edges.get(&node).into_iter().flatten() {
            if !pending.contains(target) {
                continue;
            }
            let degree = in_degree.get_mut(target).unwrap();
            *degree -= 1;
            if *degree == 0 {
                ready.insert(*target);
            }
        }
    }

    Ok(order)
}

/// Returns the smallest-id node that can reach itself within the
/// still-pending subgraph. When Kahn's ready set runs dry, every
/// pending node has an incoming edge from another pending node,
/// so such a cycle member always exists.
fn smallest_cyclic_node(
    pending: &BTreeSet<NodeId>,
    out_edges: &HashMap<NodeId, Vec<NodeId>, RandomState>,
) -> NodeId {
    for &candidate in pending {
        let successors = |n: NodeId| {
            out_edges
                .get(&n)
                .into_iter()
                .flatten()
                .copied()
                .filter(|t| pending.contains(t))
                .collect::<Vec<_>>()
        };
        let mut visited: BTreeSet<NodeId> = BTreeSet::new();
        let mut stack = successors(candidate);
        while let Some(node) = stack.pop() {
            if node == candidate {
                return candidate;
            }
            if visited.insert(node) {
                stack.extend(successors(node));
            }
        }
    }
    unreachable!()
}

fn apply(activation: ActivationType, x: f64) -> f64 {
    match activation {
        ActivationType::Sigmoid => 1.0 / (1.0 + (-4.9 * x).exp()),
        ActivationType::Tanh => x.tanh(),
        ActivationType::ReLU => x.max(0.0),
        ActivationType::Identity => x,
    }
}
