use super::{RunStatistics, Speciation};
use crate::genomics::{Genome, InnovationRegistry};

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// The complete state of a run between two generations.
///
/// A checkpoint is a plain serde value; the encoding is the
/// caller's choice. Restoring one and resuming for zero
/// generations leaves every piece of state, the random stream
/// included, exactly as it was.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The genomes awaiting evaluation.
    pub population: Vec<Genome>,
    /// Species representatives and the id watermark.
    pub speciation: Speciation,
    /// Index of the next generation to evaluate.
    pub generation: usize,
    /// Statistics accumulated so far.
    pub statistics: RunStatistics,
    /// The innovation registry's snapshot.
    pub registry: InnovationRegistry,
    /// The run's random stream, mid-sequence.
    pub rng: ChaCha8Rng,
    /// Best genome seen so far, if any generation completed.
    pub best: Option<Genome>,
}
