use thiserror::Error;

/// Errors surfaced by the evolution driver.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EvolutionError {
    /// The population has no genomes to evaluate.
    #[error("population has no genomes to evaluate")]
    EmptyPopulation,
}
