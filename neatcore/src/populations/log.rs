use crate::Innovation;

use serde::{Deserialize, Serialize};

use std::fmt;

/// Basic statistical data over a sequence of fitness values.
/// Non-finite values (failed evaluations) are left out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub maximum: f64,
    pub minimum: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl Stats {
    /// Returns statistics about numbers in a sequence.
    ///
    /// # Examples
    /// ```
    /// use neatcore::populations::Stats;
    ///
    /// let stats = Stats::from([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].iter().copied());
    /// assert_eq!(stats.maximum, 9.0);
    /// assert_eq!(stats.minimum, 2.0);
    /// assert_eq!(stats.mean, 5.0);
    /// assert_eq!(stats.std_dev, 2.0);
    /// ```
    pub fn from(data: impl Iterator<Item = f64>) -> Stats {
        let data: Vec<f64> = data.filter(|d| d.is_finite()).collect();
        if data.is_empty() {
            return Stats {
                maximum: 0.0,
                minimum: 0.0,
                mean: 0.0,
                std_dev: 0.0,
            };
        }
        let (mut max, mut min, mut sum) = (f64::MIN, f64::MAX, 0.0);
        for d in &data {
            max = d.max(max);
            min = d.min(min);
            sum += d;
        }
        let mean = sum / data.len() as f64;
        let variance =
            data.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / data.len() as f64;
        Stats {
            maximum: max,
            minimum: min,
            mean,
            std_dev: variance.sqrt(),
        }
    }
}

/// A snapshot of one generation of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Generation index, starting at 0.
    pub generation: usize,
    /// Fitness statistics over successfully evaluated genomes.
    pub fitness: Stats,
    /// Number of genomes evaluated.
    pub population_size: usize,
    /// Number of live species when the generation was bred.
    pub species_count: usize,
    /// Evaluations that failed this generation.
    pub evaluator_failures: usize,
    /// Highest innovation number assigned so far in the run.
    pub max_innovation: Innovation,
}

impl fmt::Display for GenerationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gen {:>4}: best {:>8.4}, mean {:>8.4} ± {:>7.4}, {} species, {} genomes",
            self.generation,
            self.fitness.maximum,
            self.fitness.mean,
            self.fitness.std_dev,
            self.species_count,
            self.population_size,
        )
    }
}

/// The accumulated statistics of a run, one record per
/// generation, returned alongside the best genome and carried
/// inside checkpoints.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    generations: Vec<GenerationStats>,
    evaluator_failures: usize,
}

impl RunStatistics {
    pub fn new() -> RunStatistics {
        RunStatistics::default()
    }

    pub(super) fn record(&mut self, stats: GenerationStats) {
        self.evaluator_failures += stats.evaluator_failures;
        self.generations.push(stats);
    }

    /// Returns the per-generation records, oldest first.
    pub fn generations(&self) -> &[GenerationStats] {
        &self.generations
    }

    /// Returns the most recent generation's record.
    pub fn latest(&self) -> Option<&GenerationStats> {
        self.generations.last()
    }

    /// Returns the total number of failed evaluations in the run.
    pub fn evaluator_failures(&self) -> usize {
        self.evaluator_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_ignore_failed_evaluations() {
        let stats = Stats::from([1.0, f64::NEG_INFINITY, 3.0, f64::NAN].iter().copied());
        assert_eq!(stats.maximum, 3.0);
        assert_eq!(stats.minimum, 1.0);
        assert_eq!(stats.mean, 2.0);
        assert_eq!(stats.std_dev, 1.0);
    }

    #[test]
    fn stats_of_nothing_are_zero() {
        let stats = Stats::from(std::iter::empty::<f64>());
        assert_eq!(stats.maximum, 0.0);
        assert_eq!(stats.mean, 0.0);
    }

    #[test]
    fn run_statistics_accumulate_failures() {
        let mut statistics = RunStatistics::new();
        for (generation, failures) in [(0, 2), (1, 0), (2, 1)] {
            statistics.record(GenerationStats {
                generation,
                fitness: Stats::from(std::iter::empty::<f64>()),
                population_size: 10,
                species_count: 1,
                evaluator_failures: failures,
                max_innovation: 4,
            });
        }
        assert_eq!(statistics.evaluator_failures(), 3);
        assert_eq!(statistics.generations().len(), 3);
        assert_eq!(statistics.latest().unwrap().generation, 2);
    }
}
