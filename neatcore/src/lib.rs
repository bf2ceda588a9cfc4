//! An implementation of NeuroEvolution of Augmenting Topologies,
//! following the 2002 paper: <http://nn.cs.utexas.edu/keyword?stanley:ec02>
//!
//! Populations of genomes evolve both the connectivity topology and
//! the connection weights of feed-forward neural networks through
//! variation and speciated selection. Historical markers assigned by
//! a per-run [`InnovationRegistry`] let crossover align genomes of
//! different shapes; fitness sharing within species protects young
//! topologies long enough for them to be optimised.
//!
//! Every run owns its registry and its seeded random stream, so
//! independent runs can proceed concurrently in one process, and a
//! fixed seed reproduces a run exactly. Full run state (population,
//! species representatives, registry, statistics and random stream)
//! can be captured in a [`Checkpoint`] and resumed later.
//!
//! [`InnovationRegistry`]: crate::genomics::InnovationRegistry
//! [`Checkpoint`]: crate::populations::Checkpoint
//!
//! # Example usage: Evolution of a XOR function approximator
//! ```
//! use neatcore::genomics::GeneticConfig;
//! use neatcore::populations::{self, PopulationConfig, Problem};
//! use std::num::NonZeroUsize;
//!
//! const PATTERNS: [([f64; 2], f64); 4] = [
//!     ([0.0, 0.0], 0.0),
//!     ([0.0, 1.0], 1.0),
//!     ([1.0, 0.0], 1.0),
//!     ([1.0, 1.0], 0.0),
//! ];
//!
//! let problem = Problem::new(
//!     "xor",
//!     |_, network| {
//!         let mut fitness = 4.0;
//!         for (inputs, target) in PATTERNS {
//!             let output = network.activate(&inputs).map_or(f64::NAN, |out| out[0]);
//!             fitness -= (target - output).powi(2);
//!         }
//!         fitness
//!     },
//!     |sorted, _| sorted[0].fitness() >= 3.9,
//! );
//!
//! let genetic_config = GeneticConfig {
//!     inputs: 2,
//!     outputs: 1,
//!     bias: true,
//!     ..GeneticConfig::default()
//! };
//! let population_config = PopulationConfig {
//!     population_size: NonZeroUsize::new(150).unwrap(),
//!     max_generations: 20,
//!     seed: Some(271828),
//!     ..PopulationConfig::default()
//! };
//!
//! let (best, statistics) = populations::run(&problem, genetic_config, population_config).unwrap();
//! println!(
//!     "best fitness {:.4} after {} generations",
//!     best.fitness(),
//!     statistics.generations().len(),
//! );
//! ```

pub mod genomics;
pub mod networks;
pub mod populations;

pub use genomics::GeneticConfig;
pub use populations::PopulationConfig;

/// Identifier type used to designate historically identical
/// mutations for the purposes of genome comparison and genetic
/// tracking.
pub type Innovation = u64;

/// Identifier type for genome nodes. Input, bias and output
/// nodes occupy fixed low ids; hidden node ids are handed out by
/// the innovation registry.
pub type NodeId = u64;
