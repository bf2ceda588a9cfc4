//! Genomes are the focus of evolution in NEAT.
//! They directly encode a feed-forward network as a list of
//! connection genes plus a node set, and can be progressively
//! mutated, thus adding complexity and functionality.
//!
//! All variation operators are total: when a precondition cannot
//! be met (no enabled genes to split, no free node pair to connect)
//! the operator leaves the genome unchanged instead of failing.
//! Every source of randomness is drawn from the caller's RNG so
//! that a seeded run is reproducible.

mod config;
mod genes;
mod history;

pub use config::GeneticConfig;
pub use genes::ConnectionGene;
pub use history::InnovationRegistry;

use crate::populations::SpeciesId;
use crate::{Innovation, NodeId};

use ahash::RandomState;
use rand::prelude::{Rng, SliceRandom};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Chance that a matching gene disabled in either parent is
/// inherited disabled by the child.
const DISABLE_INHERIT_CHANCE: f64 = 0.75;

/// The structural function of a node within a genome.
///
/// Roles follow from the id ranges fixed at genome creation:
/// inputs occupy `[0, inputs)`, the bias (when present) sits at
/// `inputs`, outputs follow, and every id handed out by the
/// [`InnovationRegistry`] afterwards is hidden. Classification
/// never falls back on a node's degree, which would misjudge
/// hidden nodes that mutation has left as pure sources or sinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Input,
    Bias,
    Output,
    Hidden,
}

/// A direct encoding of a network: connection genes over a node set.
///
/// Genes are kept sorted by innovation number; lookups and the
/// alignment passes of crossover and compatibility distance rely
/// on that order. Supports Serde for genome saving and loading.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Genome {
    genes: Vec<ConnectionGene>,
    nodes: BTreeSet<NodeId>,
    inputs: usize,
    outputs: usize,
    bias: bool,
    pub(crate) fitness: f64,
    pub(crate) adjusted_fitness: f64,
    pub(crate) species_id: Option<SpeciesId>,
}

impl Genome {
    /// Creates a minimal genome: a fully-connected bipartite graph
    /// from every input (plus the bias, if enabled) to every output.
    /// Weights are drawn from a Gaussian of mean 0 scaled by
    /// [`weight_power`]; innovation numbers come from the registry,
    /// so all initial genomes of a run share them.
    ///
    /// [`weight_power`]: GeneticConfig::weight_power
    ///
    /// # Examples
    /// ```
    /// use neatcore::genomics::{GeneticConfig, Genome, InnovationRegistry};
    ///
    /// let config = GeneticConfig::default();
    /// let mut registry = InnovationRegistry::new(&config);
    /// let genome = Genome::minimal(&config, &mut registry, &mut rand::thread_rng());
    ///
    /// // 3 inputs + bias, each connected to the single output.
    /// assert_eq!(genome.genes().count(), 4);
    /// assert_eq!(genome.nodes().collect::<Vec<_>>(), [0, 1, 2, 3, 4]);
    /// ```
    pub fn minimal(
        config: &GeneticConfig,
        registry: &mut InnovationRegistry,
        rng: &mut impl Rng,
    ) -> Genome {
        let mut genome = Genome::empty(config.inputs, config.outputs, config.bias);
        let sources: Vec<NodeId> = genome.input_side_ids().collect();
        let targets: Vec<NodeId> = genome.output_ids().collect();
        for &s in &sources {
            for &t in &targets {
                let innovation = registry.innovation_for(s, t);
                let weight = gaussian(rng) * config.weight_power;
                genome.insert_gene(ConnectionGene::new(innovation, s, t, weight));
            }
        }
        genome
    }

    /// Creates a genome from an explicit gene list, recomputing the
    /// node set from the genes' endpoints plus the fixed io nodes.
    ///
    /// # Examples
    /// ```
    /// use neatcore::genomics::{ConnectionGene, Genome};
    ///
    /// let genome = Genome::from_genes(1, 1, false, vec![ConnectionGene::new(1, 0, 1, 1.0)]);
    ///
    /// assert_eq!(genome.nodes().collect::<Vec<_>>(), [0, 1]);
    /// ```
    pub fn from_genes(
        inputs: usize,
        outputs: usize,
        bias: bool,
        genes: Vec<ConnectionGene>,
    ) -> Genome {
        let mut genome = Genome::empty(inputs, outputs, bias);
        for gene in genes {
            genome.insert_gene(gene);
        }
        genome
    }

    fn empty(inputs: usize, outputs: usize, bias: bool) -> Genome {
        let io_nodes = 0..(inputs + usize::from(bias) + outputs) as NodeId;
        Genome {
            genes: Vec::new(),
            nodes: io_nodes.collect(),
            inputs,
            outputs,
            bias,
            fitness: 0.0,
            adjusted_fitness: 0.0,
            species_id: None,
        }
    }

    /// Returns the role of a node id under this genome's geometry.
    pub fn role(&self, node: NodeId) -> NodeRole {
        let inputs = self.inputs as NodeId;
        let outputs = self.outputs as NodeId;
        let bias = NodeId::from(self.bias);
        if node < inputs {
            NodeRole::Input
        } else if self.bias && node == inputs {
            NodeRole::Bias
        } else if node < inputs + bias + outputs {
            NodeRole::Output
        } else {
            NodeRole::Hidden
        }
    }

    /// Returns the number of input nodes, not counting the bias.
    pub fn input_count(&self) -> usize {
        self.inputs
    }

    /// Returns the number of output nodes.
    pub fn output_count(&self) -> usize {
        self.outputs
    }

    /// Returns the id of the bias node, if the genome has one.
    pub fn bias_id(&self) -> Option<NodeId> {
        self.bias.then_some(self.inputs as NodeId)
    }

    /// Input node ids in canonical order, bias included.
    pub(crate) fn input_side_ids(&self) -> impl Iterator<Item = NodeId> {
        0..(self.inputs + usize::from(self.bias)) as NodeId
    }

    /// Output node ids in canonical order.
    pub fn output_ids(&self) -> impl Iterator<Item = NodeId> {
        let first = (self.inputs + usize::from(self.bias)) as NodeId;
        first..first + self.outputs as NodeId
    }

    /// Returns an iterator over the genome's genes,
    /// in ascending innovation order.
    pub fn genes(&self) -> impl Iterator<Item = &ConnectionGene> {
        self.genes.iter()
    }

    /// Returns an iterator over the genome's node ids, ascending.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Returns the genome's current fitness.
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    /// Returns the genome's fitness after sharing within its species.
    pub fn adjusted_fitness(&self) -> f64 {
        self.adjusted_fitness
    }

    /// Returns the species the genome was last assigned to.
    pub fn species_id(&self) -> Option<SpeciesId> {
        self.species_id
    }

    fn find_gene(&self, innovation: Innovation) -> Option<&ConnectionGene> {
        self.genes
            .binary_search_by_key(&innovation, |g| g.innovation)
            .ok()
            .map(|i| &self.genes[i])
    }

    /// Inserts a gene, keeping the list sorted by innovation and
    /// the node set closed over the gene's endpoints.
    fn insert_gene(&mut self, gene: ConnectionGene) {
        self.nodes.insert(gene.in_node);
        self.nodes.insert(gene.out_node);
        match self
            .genes
            .binary_search_by_key(&gene.innovation, |g| g.innovation)
        {
            // An aligned duplicate can only come from re-inserting
            // the same structural edge; keep the existing gene.
            Ok(_) => {}
            Err(position) => self.genes.insert(position, gene),
        }
    }

    fn has_edge(&self, in_node: NodeId, out_node: NodeId) -> bool {
        self.genes
            .iter()
            .any(|g| g.in_node == in_node && g.out_node == out_node)
    }

    /// Whether `to` is reachable from `from` along gene edges,
    /// disabled ones included. Used to keep the gene graph acyclic
    /// even across later toggle mutations.
    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited: HashSet<NodeId, RandomState> = HashSet::default();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if visited.insert(node) {
                stack.extend(
                    self.genes
                        .iter()
                        .filter(|g| g.in_node == node)
                        .map(|g| g.out_node),
                );
            }
        }
        false
    }

    /// Calculates the compatibility distance between two genomes:
    ///
    /// `d = c1·E/N + c2·D/N + c3·W`
    ///
    /// where `E` and `D` are the excess and disjoint gene counts,
    /// `W` is the mean absolute weight difference over matching
    /// genes, and `N = max(1, max(|a|, |b|))`. The count terms are
    /// always normalised, regardless of genome size.
    ///
    /// # Examples
    /// ```
    /// use neatcore::genomics::{ConnectionGene, GeneticConfig, Genome};
    ///
    /// let a = Genome::from_genes(1, 1, false, vec![
    ///     ConnectionGene::new(1, 0, 1, 0.0),
    /// ]);
    /// let b = Genome::from_genes(1, 1, false, vec![
    ///     ConnectionGene::new(1, 0, 1, 1.0),
    /// ]);
    ///
    /// let d = Genome::compatibility_distance(&a, &b, &GeneticConfig::default());
    ///
    /// // One matching gene with weight difference 1.0, weighted 0.4.
    /// assert!((d - 0.4).abs() < 1e-12);
    /// ```
    pub fn compatibility_distance(a: &Genome, b: &Genome, config: &GeneticConfig) -> f64 {
        let max_a = a.genes.last().map_or(0, |g| g.innovation);
        let max_b = b.genes.last().map_or(0, |g| g.innovation);

        let mut matching = 0usize;
        let mut weight_diff = 0.0;
        let mut disjoint = 0usize;
        let mut excess = 0usize;

        let mut unmatched = |innovation: Innovation, other_max: Innovation| {
            if innovation > other_max {
                excess += 1;
            } else {
                disjoint += 1;
            }
        };

        let (mut i, mut j) = (0, 0);
        while i < a.genes.len() || j < b.genes.len() {
            match (a.genes.get(i), b.genes.get(j)) {
                (Some(ga), Some(gb)) if ga.innovation == gb.innovation => {
                    matching += 1;
                    weight_diff += (ga.weight - gb.weight).abs();
                    i += 1;
                    j += 1;
                }
                (Some(ga), Some(gb)) if ga.innovation < gb.innovation => {
                    unmatched(ga.innovation, max_b);
                    i += 1;
                }
                (Some(_), Some(gb)) => {
                    unmatched(gb.innovation, max_a);
                    j += 1;
                }
                (Some(ga), None) => {
                    unmatched(ga.innovation, max_b);
                    i += 1;
                }
                (None, Some(gb)) => {
                    unmatched(gb.innovation, max_a);
                    j += 1;
                }
                (None, None) => unreachable!(),
            }
        }

        let n = a.genes.len().max(b.genes.len()).max(1) as f64;
        let mean_weight_diff = if matching > 0 {
            weight_diff / matching as f64
        } else {
            0.0
        };

        config.excess_factor * excess as f64 / n
            + config.disjoint_factor * disjoint as f64 / n
            + config.weight_factor * mean_weight_diff
    }

    /// Combines two parents into a child genome.
    ///
    /// Matching genes are inherited from either parent with equal
    /// probability; disjoint and excess genes come from the fitter
    /// parent only (ties resolve toward the first argument). A
    /// matching gene that is disabled in either parent is disabled
    /// in the child with probability 0.75, re-enabling the rest,
    /// so suppressed structure keeps a path back into expression.
    ///
    /// The child's node set is recomputed from its genes' endpoints
    /// plus the fixed io nodes.
    pub fn crossover(a: &Genome, b: &Genome, rng: &mut impl Rng) -> Genome {
        let (fitter, other) = if b.fitness > a.fitness { (b, a) } else { (a, b) };

        let mut child = Genome::empty(fitter.inputs, fitter.outputs, fitter.bias);
        for gene in &fitter.genes {
            let inherited = match other.find_gene(gene.innovation) {
                Some(aligned) => {
                    let mut pick = if rng.gen_bool(0.5) {
                        gene.clone()
                    } else {
                        aligned.clone()
                    };
                    if !gene.enabled || !aligned.enabled {
                        pick.enabled = !rng.gen_bool(DISABLE_INHERIT_CHANCE);
                    }
                    pick
                }
                None => gene.clone(),
            };
            child.insert_gene(inherited);
        }
        child
    }

    /// Induces a node addition mutation: a uniformly random enabled
    /// gene is split in two by a fresh hidden node. The incoming
    /// half receives weight 1.0 and the outgoing half the split
    /// gene's weight, so the genome's behavior is preserved at the
    /// moment of introduction (modulo the activation non-linearity).
    ///
    /// Returns the new node's id, or `None` if the genome has no
    /// enabled genes, in which case it is left unchanged.
    pub fn mutate_add_node(
        &mut self,
        registry: &mut InnovationRegistry,
        rng: &mut impl Rng,
    ) -> Option<NodeId> {
        let enabled: Vec<usize> = self
            .genes
            .iter()
            .enumerate()
            .filter(|(_, g)| g.enabled)
            .map(|(i, _)| i)
            .collect();
        let &split = enabled.choose(rng)?;

        let (in_node, out_node) = self.genes[split].endpoints();
        let weight = self.genes[split].weight;
        self.genes[split].disable();

        let hidden = registry.fresh_node();
        let in_half = registry.innovation_for(in_node, hidden);
        let out_half = registry.innovation_for(hidden, out_node);
        self.insert_gene(ConnectionGene::new(in_half, in_node, hidden, 1.0));
        self.insert_gene(ConnectionGene::new(out_half, hidden, out_node, weight));
        Some(hidden)
    }

    /// Induces a connection addition mutation.
    ///
    /// Candidate endpoint pairs are tried by role preference, in the
    /// order hidden→output, input→hidden, input→output, hidden→hidden,
    /// choosing uniformly within the first category that has a viable
    /// pair. A pair is viable if the edge is not already present, is
    /// not a self-loop, and does not close a cycle. The new weight is
    /// a Gaussian draw scaled by [`weight_power`].
    ///
    /// Returns the new gene's innovation number, or `None` if the
    /// genome is fully connected, in which case it is left unchanged.
    ///
    /// [`weight_power`]: GeneticConfig::weight_power
    pub fn mutate_add_connection(
        &mut self,
        config: &GeneticConfig,
        registry: &mut InnovationRegistry,
        rng: &mut impl Rng,
    ) -> Option<Innovation> {
        let input_side: Vec<NodeId> = self.input_side_ids().collect();
        let outputs: Vec<NodeId> = self.output_ids().collect();
        let hidden: Vec<NodeId> = self
            .nodes
            .iter()
            .copied()
            .filter(|&n| self.role(n) == NodeRole::Hidden)
            .collect();

        let categories: [(&[NodeId], &[NodeId]); 4] = [
            (&hidden, &outputs),
            (&input_side, &hidden),
            (&input_side, &outputs),
            (&hidden, &hidden),
        ];

        for (sources, targets) in categories {
            let candidates: Vec<(NodeId, NodeId)> = sources
                .iter()
                .flat_map(|&s| targets.iter().map(move |&t| (s, t)))
                .filter(|&(s, t)| s != t && !self.has_edge(s, t) && !self.reaches(t, s))
                .collect();
            if let Some(&(s, t)) = candidates.choose(rng) {
                let innovation = registry.innovation_for(s, t);
                let weight = gaussian(rng) * config.weight_power;
                self.insert_gene(ConnectionGene::new(innovation, s, t, weight));
                return Some(innovation);
            }
        }
        None
    }

    /// Induces a weight mutation pass over every gene: with
    /// probability [`perturbation_rate`] the weight is nudged by a
    /// Gaussian scaled by [`perturbation_power`], otherwise it is
    /// replaced by a fresh draw scaled by [`weight_power`].
    ///
    /// [`perturbation_rate`]: GeneticConfig::perturbation_rate
    /// [`perturbation_power`]: GeneticConfig::perturbation_power
    /// [`weight_power`]: GeneticConfig::weight_power
    pub fn mutate_weights(&mut self, config: &GeneticConfig, rng: &mut impl Rng) {
        for gene in &mut self.genes {
            if rng.gen_bool(config.perturbation_rate) {
                gene.weight += gaussian(rng) * config.perturbation_power;
            } else {
                gene.weight = gaussian(rng) * config.weight_power;
            }
        }
    }

    /// Flips the enabled bit of one uniformly chosen gene.
    /// Leaves an empty genome unchanged.
    pub fn mutate_toggle(&mut self, rng: &mut impl Rng) {
        if let Some(gene) = self.genes.choose_mut(rng) {
            gene.enabled = !gene.enabled;
        }
    }

    /// Applies each structural operator independently with its
    /// configured probability, in the fixed order add-node,
    /// add-connection, weight mutation, toggle. The fixed order is
    /// what makes a seeded run reproducible.
    pub fn mutate(
        &mut self,
        config: &GeneticConfig,
        registry: &mut InnovationRegistry,
        rng: &mut impl Rng,
    ) {
        if rng.gen_bool(config.add_node_rate) {
            self.mutate_add_node(registry, rng);
        }
        if rng.gen_bool(config.add_connection_rate) {
            self.mutate_add_connection(config, registry, rng);
        }
        if rng.gen_bool(config.weight_mutation_rate) {
            self.mutate_weights(config, rng);
        }
        if rng.gen_bool(config.toggle_rate) {
            self.mutate_toggle(rng);
        }
    }
}

fn gaussian(rng: &mut impl Rng) -> f64 {
    rng.sample(StandardNormal)
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Genome")
            .field("genes", &self.genes)
            .field("nodes", &self.nodes)
            .field("fitness", &self.fitness)
            .finish()
    }
}
