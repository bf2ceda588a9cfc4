use crate::genomics::Genome;
use crate::networks::Network;

use rayon::prelude::*;

type FitnessFn = dyn Fn(&Genome, &mut Network) -> f64 + Send + Sync;
type TerminationFn = dyn Fn(&[Genome], usize) -> bool + Send + Sync;

/// The task a population is evolved against: a fitness function
/// over a genome and its compiled network, plus a termination
/// predicate over the fitness-sorted population.
///
/// Fitness evaluations must be pure functions of the genome for
/// a run to be reproducible under a fixed seed.
pub struct Problem {
    name: String,
    fitness: Box<FitnessFn>,
    termination: Box<TerminationFn>,
}

impl Problem {
    /// Creates a problem from a fitness function and a
    /// termination predicate.
    ///
    /// # Examples
    /// ```
    /// use neatcore::populations::Problem;
    ///
    /// let problem = Problem::new(
    ///     "threshold",
    ///     |_genome, network| network.activate(&[1.0, 0.0, 0.5]).map_or(0.0, |out| out[0]),
    ///     |sorted, _generation| sorted[0].fitness() > 0.99,
    /// );
    ///
    /// assert_eq!(problem.name(), "threshold");
    /// ```
    pub fn new(
        name: impl Into<String>,
        fitness: impl Fn(&Genome, &mut Network) -> f64 + Send + Sync + 'static,
        termination: impl Fn(&[Genome], usize) -> bool + Send + Sync + 'static,
    ) -> Problem {
        Problem {
            name: name.into(),
            fitness: Box::new(fitness),
            termination: Box::new(termination),
        }
    }

    /// Returns the problem's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates one genome against the problem.
    pub fn fitness(&self, genome: &Genome, network: &mut Network) -> f64 {
        (self.fitness)(genome, network)
    }

    /// Whether the run should stop, given the population sorted
    /// by decreasing fitness and the current generation index.
    pub fn terminated(&self, sorted_population: &[Genome], generation: usize) -> bool {
        (self.termination)(sorted_population, generation)
    }
}

/// A strategy for mapping fitness evaluation over a population.
///
/// Implementations must write a fitness into every genome, keep
/// the slice order intact, and report how many evaluations
/// failed. A failed evaluation (a panic-free non-finite fitness,
/// typically NaN from a degenerate network output) leaves the
/// genome at `f64::NEG_INFINITY`: it survives into speciation but
/// can never be an elite, and its species attracts no offspring
/// once non-positive fitness sums are filtered out.
pub trait Evaluator {
    fn evaluate(&self, genomes: &mut [Genome], problem: &Problem) -> usize;
}

/// Evaluates genomes one after another on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialEvaluator;

impl Evaluator for SerialEvaluator {
    fn evaluate(&self, genomes: &mut [Genome], problem: &Problem) -> usize {
        genomes
            .iter_mut()
            .map(|genome| usize::from(evaluate_one(genome, problem)))
            .sum()
    }
}

/// Evaluates genomes on the rayon thread pool. Results are
/// written in place, so ordering and determinism match the
/// serial evaluator as long as the fitness function is pure.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParallelEvaluator;

impl Evaluator for ParallelEvaluator {
    fn evaluate(&self, genomes: &mut [Genome], problem: &Problem) -> usize {
        genomes
            .par_iter_mut()
            .map(|genome| usize::from(evaluate_one(genome, problem)))
            .sum()
    }
}

/// Builds the genome's phenotype, scores it, and records the
/// fitness. Returns whether the evaluation failed.
fn evaluate_one(genome: &mut Genome, problem: &Problem) -> bool {
    let mut network = Network::create(genome);
    let fitness = problem.fitness(genome, &mut network);
    if fitness.is_finite() {
        genome.fitness = fitness;
        false
    } else {
        genome.fitness = f64::NEG_INFINITY;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{GeneticConfig, InnovationRegistry};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn population(count: usize) -> Vec<Genome> {
        let config = GeneticConfig::default();
        let mut registry = InnovationRegistry::new(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        (0..count)
            .map(|_| Genome::minimal(&config, &mut registry, &mut rng))
            .collect()
    }

    fn sum_of_outputs() -> Problem {
        Problem::new(
            "sum",
            |_, network| {
                network
                    .activate(&[1.0, 0.5, -0.5])
                    .map_or(f64::NAN, |out| out.iter().sum())
            },
            |_, _| false,
        )
    }

    #[test]
    fn serial_and_parallel_agree() {
        let problem = sum_of_outputs();
        let mut serial = population(20);
        let mut parallel = serial.clone();

        assert_eq!(SerialEvaluator.evaluate(&mut serial, &problem), 0);
        assert_eq!(ParallelEvaluator.evaluate(&mut parallel, &problem), 0);

        for (a, b) in serial.iter().zip(&parallel) {
            assert_eq!(a.fitness(), b.fitness());
        }
    }

    #[test]
    fn failures_are_counted_and_sunk() {
        let problem = Problem::new("poison", |_, _| f64::NAN, |_, _| false);
        let mut genomes = population(4);
        let failures = SerialEvaluator.evaluate(&mut genomes, &problem);
        assert_eq!(failures, 4);
        assert!(genomes.iter().all(|g| g.fitness() == f64::NEG_INFINITY));
    }
}
