//! A population is a collection of genomes grouped into species
//! that is evolved against a [`Problem`], using fitness sharing
//! as the source of selective pressure.
//!
//! The [`Evolution`] driver owns everything a run mutates: the
//! population, the species representatives, the innovation
//! registry and the seeded random stream. One generation runs
//! evaluate → speciate → reproduce; the driver stops on the
//! problem's termination predicate, on the generation cap, or on
//! a [`CancellationToken`], and in every case hands back the best
//! genome seen so far together with the run's statistics.

mod checkpoint;
mod config;
mod errors;
mod evaluation;
mod log;
mod offspring;
mod species;

pub use checkpoint::Checkpoint;
pub use config::PopulationConfig;
pub use errors::EvolutionError;
pub use evaluation::{Evaluator, ParallelEvaluator, Problem, SerialEvaluator};
pub use log::{GenerationStats, RunStatistics, Stats};
pub use species::{Speciation, Species, SpeciesId};

use crate::genomics::{GeneticConfig, Genome, InnovationRegistry};
use offspring::OffspringFactory;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative stop signal for a running evolution.
///
/// The driver checks the token between generations; a cancelled
/// run returns the best genome found so far and the statistics
/// accumulated up to that point. Clones share the same flag, so
/// a token can be handed to another thread and flipped there.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    /// Requests that the run stop after the current generation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The state of one evolution run.
///
/// Each run owns its innovation registry and random stream;
/// nothing is shared between concurrent runs in the same
/// process.
pub struct Evolution {
    population: Vec<Genome>,
    speciation: Speciation,
    registry: InnovationRegistry,
    rng: ChaCha8Rng,
    generation: usize,
    statistics: RunStatistics,
    best: Option<Genome>,
    genetic_config: GeneticConfig,
    population_config: PopulationConfig,
}

impl Evolution {
    /// Creates a run with a freshly spawned population of minimal
    /// genomes.
    ///
    /// These configurations shouldn't be modified once evolution
    /// begins, thus they are copied and kept by the run for the
    /// duration of its lifetime.
    pub fn new(genetic_config: GeneticConfig, population_config: PopulationConfig) -> Evolution {
        let mut registry = InnovationRegistry::new(&genetic_config);
        let mut rng = match population_config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let population = (0..population_config.population_size.get())
            .map(|_| Genome::minimal(&genetic_config, &mut registry, &mut rng))
            .collect();

        Evolution {
            population,
            speciation: Speciation::new(),
            registry,
            rng,
            generation: 0,
            statistics: RunStatistics::new(),
            best: None,
            genetic_config,
            population_config,
        }
    }

    /// Evolves the population until the problem's termination
    /// predicate fires or the generation cap is reached.
    ///
    /// # Errors
    /// Returns [`EvolutionError::EmptyPopulation`] if there is
    /// nothing to evaluate.
    pub fn run(
        &mut self,
        problem: &Problem,
        evaluator: &impl Evaluator,
    ) -> Result<(Genome, RunStatistics), EvolutionError> {
        self.run_with_cancellation(problem, evaluator, &CancellationToken::new())
    }

    /// Like [`run`](Evolution::run), but also stops when the
    /// token is cancelled, returning the best-so-far.
    pub fn run_with_cancellation(
        &mut self,
        problem: &Problem,
        evaluator: &impl Evaluator,
        token: &CancellationToken,
    ) -> Result<(Genome, RunStatistics), EvolutionError> {
        loop {
            let finished = self.step(problem, evaluator)?;
            if finished || token.is_cancelled() {
                // The population is never empty here, so at least
                // one generation has set a best genome.
                let best = match &self.best {
                    Some(best) => best.clone(),
                    None => return Err(EvolutionError::EmptyPopulation),
                };
                info!(
                    problem = problem.name(),
                    generation = self.generation,
                    fitness = best.fitness(),
                    "run finished"
                );
                return Ok((best, self.statistics.clone()));
            }
        }
    }

    /// Runs a single generation: evaluates the population,
    /// records statistics, and unless a termination condition
    /// holds, breeds the next generation.
    ///
    /// Returns whether the run is finished.
    ///
    /// # Errors
    /// Returns [`EvolutionError::EmptyPopulation`] if there is
    /// nothing to evaluate.
    pub fn step(
        &mut self,
        problem: &Problem,
        evaluator: &impl Evaluator,
    ) -> Result<bool, EvolutionError> {
        if self.population.is_empty() {
            return Err(EvolutionError::EmptyPopulation);
        }

        let failures = evaluator.evaluate(&mut self.population, problem);
        self.population
            .sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        let champion = &self.population[0];
        if self
            .best
            .as_ref()
            .map_or(true, |best| champion.fitness > best.fitness)
        {
            self.best = Some(champion.clone());
        }

        let stats = GenerationStats {
            generation: self.generation,
            fitness: Stats::from(self.population.iter().map(|g| g.fitness)),
            population_size: self.population.len(),
            species_count: self.speciation.species_count(),
            evaluator_failures: failures,
            max_innovation: self.registry.max_innovation(),
        };
        debug!(
            generation = stats.generation,
            best = stats.fitness.maximum,
            species = stats.species_count,
            failures, "generation evaluated"
        );
        self.statistics.record(stats);

        if problem.terminated(&self.population, self.generation)
            || self.generation >= self.population_config.max_generations
        {
            return Ok(true);
        }

        let genomes = std::mem::take(&mut self.population);
        let mut species = self.speciation.speciate(
            genomes,
            self.population_config.compatibility_threshold,
            &self.genetic_config,
            &mut self.rng,
        );
        offspring::share_fitness(&mut species);
        let allotments = offspring::allot_offspring(
            &species,
            self.population_config.population_size.get(),
        );
        let mut factory = OffspringFactory::new(
            &self.genetic_config,
            &self.population_config,
            &mut self.registry,
        );
        self.population = factory.generate(&mut species, &allotments, &mut self.rng);
        self.generation += 1;
        Ok(false)
    }

    /// Captures the run's complete state between generations.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            population: self.population.clone(),
            speciation: self.speciation.clone(),
            generation: self.generation,
            statistics: self.statistics.clone(),
            registry: self.registry.snapshot(),
            rng: self.rng.clone(),
            best: self.best.clone(),
        }
    }

    /// Rebuilds a run from a checkpoint. The configurations are
    /// supplied by the caller and must match the ones the
    /// checkpointed run was started with.
    pub fn resume(
        checkpoint: Checkpoint,
        genetic_config: GeneticConfig,
        population_config: PopulationConfig,
    ) -> Evolution {
        Evolution {
            population: checkpoint.population,
            speciation: checkpoint.speciation,
            registry: checkpoint.registry,
            rng: checkpoint.rng,
            generation: checkpoint.generation,
            statistics: checkpoint.statistics,
            best: checkpoint.best,
            genetic_config,
            population_config,
        }
    }

    /// Returns the current generation index.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Returns an iterator over the current genomes.
    pub fn population(&self) -> impl Iterator<Item = &Genome> {
        self.population.iter()
    }

    /// Returns the statistics accumulated so far.
    pub fn statistics(&self) -> &RunStatistics {
        &self.statistics
    }

    /// Returns the best genome seen so far.
    pub fn best(&self) -> Option<&Genome> {
        self.best.as_ref()
    }
}

/// Runs a whole evolution synchronously with the serial
/// evaluator, returning the best genome and the run statistics.
///
/// # Errors
/// Returns [`EvolutionError::EmptyPopulation`] if there is
/// nothing to evaluate.
pub fn run(
    problem: &Problem,
    genetic_config: GeneticConfig,
    population_config: PopulationConfig,
) -> Result<(Genome, RunStatistics), EvolutionError> {
    Evolution::new(genetic_config, population_config).run(problem, &SerialEvaluator)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::num::NonZeroUsize;

    fn small_configs(seed: u64) -> (GeneticConfig, PopulationConfig) {
        let genetic = GeneticConfig {
            inputs: 2,
            outputs: 1,
            bias: true,
            ..GeneticConfig::default()
        };
        let population = PopulationConfig {
            population_size: NonZeroUsize::new(30).unwrap(),
            max_generations: 10,
            seed: Some(seed),
            ..PopulationConfig::default()
        };
        (genetic, population)
    }

    fn sum_problem() -> Problem {
        Problem::new(
            "sum-of-outputs",
            |_, network| network.activate(&[1.0, 0.5]).map_or(f64::NAN, |out| out[0]),
            |_, _| false,
        )
    }

    #[test]
    fn run_returns_best_and_per_generation_stats() {
        let (genetic, population) = small_configs(3);
        let (best, statistics) = run(&sum_problem(), genetic, population).unwrap();

        // 10 breeding generations plus the final evaluated one.
        assert_eq!(statistics.generations().len(), 11);
        assert!(best.fitness() > 0.0);
        for (i, generation) in statistics.generations().iter().enumerate() {
            assert_eq!(generation.generation, i);
            assert_eq!(generation.population_size, 30);
        }
        // The reported best matches the stats' high-water mark.
        let high_water = statistics
            .generations()
            .iter()
            .map(|g| g.fitness.maximum)
            .fold(f64::MIN, f64::max);
        assert_eq!(best.fitness(), high_water);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let problem = sum_problem();
        let (genetic, population) = small_configs(42);
        let first = run(&problem, genetic.clone(), population.clone()).unwrap();
        let second = run(&problem, genetic, population).unwrap();

        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn termination_predicate_stops_the_run() {
        let problem = Problem::new(
            "stop-at-three",
            |_, network| network.activate(&[1.0, 0.5]).map_or(f64::NAN, |out| out[0]),
            |_, generation| generation >= 3,
        );
        let (genetic, population) = small_configs(1);
        let (_, statistics) = run(&problem, genetic, population).unwrap();
        assert_eq!(statistics.generations().len(), 4);
    }

    #[test]
    fn cancellation_returns_best_so_far() {
        let token = CancellationToken::new();
        token.cancel();

        let (genetic, population) = small_configs(9);
        let mut evolution = Evolution::new(genetic, population);
        let (best, statistics) = evolution
            .run_with_cancellation(&sum_problem(), &SerialEvaluator, &token)
            .unwrap();

        // Exactly one generation ran before the token was honored.
        assert_eq!(statistics.generations().len(), 1);
        assert!(best.fitness().is_finite());
    }

    #[test]
    fn population_size_is_preserved_across_generations() {
        let (genetic, population) = small_configs(17);
        let mut evolution = Evolution::new(genetic, population);
        for _ in 0..5 {
            evolution.step(&sum_problem(), &SerialEvaluator).unwrap();
            assert_eq!(evolution.population().count(), 30);
        }
    }

    #[test]
    fn every_genome_is_speciated_after_a_step() {
        let (genetic, population) = small_configs(17);
        let mut evolution = Evolution::new(genetic, population);
        evolution.step(&sum_problem(), &SerialEvaluator).unwrap();

        let live: Vec<SpeciesId> = evolution
            .speciation
            .representatives()
            .map(|(id, _)| id)
            .collect();
        for genome in evolution.population() {
            let id = genome.species_id().expect("offspring must carry a species");
            assert!(live.contains(&id));
        }
    }

    #[test]
    fn empty_population_is_rejected() {
        let (genetic, population) = small_configs(0);
        let mut evolution = Evolution::new(genetic.clone(), population.clone());
        let checkpoint = Checkpoint {
            population: vec![],
            ..evolution.checkpoint()
        };
        let mut resumed = Evolution::resume(checkpoint, genetic, population);
        assert_eq!(
            resumed.step(&sum_problem(), &SerialEvaluator),
            Err(EvolutionError::EmptyPopulation)
        );
        // The original run is unaffected.
        assert!(evolution.step(&sum_problem(), &SerialEvaluator).is_ok());
    }

    #[test]
    fn checkpoint_round_trips_through_serde() {
        let (genetic, population) = small_configs(7);
        let mut evolution = Evolution::new(genetic.clone(), population.clone());
        for _ in 0..3 {
            evolution.step(&sum_problem(), &SerialEvaluator).unwrap();
        }

        let checkpoint = evolution.checkpoint();
        let encoded = ron::to_string(&checkpoint).unwrap();
        let decoded: Checkpoint = ron::from_str(&encoded).unwrap();
        assert_eq!(checkpoint, decoded);

        // Resuming for zero generations changes nothing.
        let resumed = Evolution::resume(decoded, genetic, population);
        assert_eq!(resumed.checkpoint(), checkpoint);
    }

    #[test]
    fn resumed_runs_continue_identically() {
        let problem = sum_problem();
        let (genetic, population) = small_configs(29);

        let mut reference = Evolution::new(genetic.clone(), population.clone());
        for _ in 0..4 {
            reference.step(&problem, &SerialEvaluator).unwrap();
        }

        let mut original = Evolution::new(genetic.clone(), population.clone());
        original.step(&problem, &SerialEvaluator).unwrap();
        original.step(&problem, &SerialEvaluator).unwrap();
        let mut resumed = Evolution::resume(original.checkpoint(), genetic, population);
        resumed.step(&problem, &SerialEvaluator).unwrap();
        resumed.step(&problem, &SerialEvaluator).unwrap();

        assert_eq!(resumed.checkpoint(), reference.checkpoint());
    }
}
