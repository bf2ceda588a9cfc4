use serde::{Deserialize, Serialize};

use std::num::NonZeroUsize;

/// Configuration data for population generation
/// and evolution.
///
/// # Note
/// All quantities expressing probabilities
/// should be in the range [0.0, 1.0]. Using
/// values that are not in this bound may result
/// in odd behaviours and/or incorrect programs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Size of the population.
    pub population_size: NonZeroUsize,
    /// Hard cap on the number of generations before the run
    /// stops and returns the best genome found so far.
    pub max_generations: usize,
    /// Compatibility distance below which a genome joins a
    /// species.
    pub compatibility_threshold: f64,
    /// Top n of each species which is copied as-is to the next
    /// generation.
    pub elitism: usize,
    /// Chance that an offspring is produced by crossover rather
    /// than by cloning a single parent.
    pub crossover_rate: f64,
    /// Number of contenders drawn (without replacement) per
    /// parent-selection tournament.
    pub tournament_size: usize,
    /// Seed for the run's random stream. When absent, the run
    /// seeds itself from entropy and is not reproducible.
    pub seed: Option<u64>,
}

impl Default for PopulationConfig {
    fn default() -> PopulationConfig {
        PopulationConfig {
            population_size: NonZeroUsize::new(150).unwrap(),
            max_generations: 500,
            compatibility_threshold: 3.0,
            elitism: 1,
            crossover_rate: 0.7,
            tournament_size: 3,
            seed: None,
        }
    }
}
