use serde::{Deserialize, Serialize};

/// Configuration data for genome generation
/// and inter-genome operations.
///
/// # Note
/// All quantities expressing probabilities
/// should be in the range [0.0, 1.0]. Using
/// values that are not in this bound may result
/// in odd behaviours and/or incorrect programs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneticConfig {
    /// Number of input nodes in a genome, not counting the bias.
    pub inputs: usize,
    /// Number of output nodes in a genome.
    pub outputs: usize,
    /// Whether genomes carry a bias node, a designated input
    /// whose activation is pinned to 1.0.
    pub bias: bool,
    /// Chance of a node addition mutation per offspring.
    pub add_node_rate: f64,
    /// Chance of a connection addition mutation per offspring.
    pub add_connection_rate: f64,
    /// Chance that an offspring undergoes a weight mutation pass.
    pub weight_mutation_rate: f64,
    /// Chance of flipping one gene's enabled bit per offspring.
    pub toggle_rate: f64,
    /// Within a weight mutation pass, per-gene chance of perturbing
    /// the weight rather than replacing it outright.
    pub perturbation_rate: f64,
    /// Scale of the Gaussian perturbation added to a weight.
    pub perturbation_power: f64,
    /// Scale of the Gaussian draw used for fresh weights,
    /// both at genome creation and on weight replacement.
    pub weight_power: f64,
    /// Weight of excess genes in compatibility distance.
    pub excess_factor: f64,
    /// Weight of disjoint genes in compatibility distance.
    pub disjoint_factor: f64,
    /// Weight of the mean matching-gene weight difference
    /// in compatibility distance.
    pub weight_factor: f64,
}

impl Default for GeneticConfig {
    fn default() -> GeneticConfig {
        GeneticConfig {
            inputs: 3,
            outputs: 1,
            bias: true,
            add_node_rate: 0.03,
            add_connection_rate: 0.05,
            weight_mutation_rate: 0.8,
            toggle_rate: 0.01,
            perturbation_rate: 0.9,
            perturbation_power: 0.5,
            weight_power: 2.0,
            excess_factor: 1.0,
            disjoint_factor: 1.0,
            weight_factor: 0.4,
        }
    }
}

impl GeneticConfig {
    /// Number of non-hidden nodes every genome with this
    /// configuration starts with.
    pub(crate) fn io_node_count(&self) -> usize {
        self.inputs + usize::from(self.bias) + self.outputs
    }
}
