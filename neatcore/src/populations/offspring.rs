use super::{PopulationConfig, Species};
use crate::genomics::{GeneticConfig, Genome, InnovationRegistry};

use rand::prelude::{Rng, SliceRandom};

/// Applies fitness sharing: every member's adjusted fitness is
/// its raw fitness divided by the size of its species, so crowded
/// niches split their reproductive credit.
pub(super) fn share_fitness(species: &mut [Species]) {
    for s in species {
        let size = s.members.len() as f64;
        for genome in &mut s.members {
            genome.adjusted_fitness = genome.fitness / size;
        }
    }
}

/// Allots each species its number of offspring for the next
/// generation, proportional to its summed adjusted fitness.
///
/// Species whose adjusted-fitness sum is not positive are
/// excluded. If no species has a positive sum the allotment is
/// an equal split instead. Rounding is then reconciled so the
/// grand total always equals `population_size` exactly: slots
/// are added to the currently largest allotment and removed from
/// the smallest allotment above one, re-scanning after every
/// step. If slots must be removed but every allotment is already
/// at one, the species with the weakest adjusted-fitness sum
/// loses its last slot and goes extinct. All ties resolve toward
/// the lowest species id, keeping the allotment deterministic.
pub(super) fn allot_offspring(species: &[Species], population_size: usize) -> Vec<usize> {
    let sums: Vec<f64> = species
        .iter()
        .map(|s| s.members.iter().map(|g| g.adjusted_fitness).sum())
        .collect();
    let total: f64 = sums.iter().copied().filter(|&s| s > 0.0).sum();

    let mut allotments: Vec<usize> = if total <= 0.0 {
        let share = population_size / species.len().max(1);
        vec![share; species.len()]
    } else {
        sums.iter()
            .map(|&s| {
                if s > 0.0 {
                    ((s / total * population_size as f64).floor() as usize).max(1)
                } else {
                    0
                }
            })
            .collect()
    };

    loop {
        let allotted: usize = allotments.iter().sum();
        if allotted < population_size {
            let largest = argmax(allotments.iter().copied());
            allotments[largest] += 1;
        } else if allotted > population_size {
            let shrinkable = allotments
                .iter()
                .enumerate()
                .filter(|(_, &a)| a > 1)
                .min_by_key(|(_, &a)| a)
                .map(|(i, _)| i);
            match shrinkable {
                Some(smallest) => allotments[smallest] -= 1,
                None => {
                    // Every surviving species is down to one slot;
                    // the weakest one goes extinct.
                    let weakest = argmin_by_sum(&allotments, &sums);
                    allotments[weakest] = 0;
                }
            }
        } else {
            return allotments;
        }
    }
}

fn argmax(values: impl Iterator<Item = usize>) -> usize {
    let mut best = 0;
    let mut best_value = 0;
    for (i, value) in values.enumerate() {
        if value > best_value {
            best = i;
            best_value = value;
        }
    }
    best
}

fn argmin_by_sum(allotments: &[usize], sums: &[f64]) -> usize {
    allotments
        .iter()
        .enumerate()
        .filter(|(_, &a)| a > 0)
        .min_by(|(i, _), (j, _)| sums[*i].total_cmp(&sums[*j]))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Auxiliary type for offspring generation.
/// Handles the breeding of a population's next generation
/// according to the specified configs and allotted offspring.
pub(super) struct OffspringFactory<'a> {
    genetic_config: &'a GeneticConfig,
    population_config: &'a PopulationConfig,
    registry: &'a mut InnovationRegistry,
}

impl<'a> OffspringFactory<'a> {
    pub(super) fn new(
        genetic_config: &'a GeneticConfig,
        population_config: &'a PopulationConfig,
        registry: &'a mut InnovationRegistry,
    ) -> OffspringFactory<'a> {
        OffspringFactory {
            genetic_config,
            population_config,
            registry,
        }
    }

    /// Generates the allotted offspring of every species.
    ///
    /// Species are processed in ascending id order (the order the
    /// slice arrives in) and their members sorted by decreasing
    /// fitness, so a seeded run consumes randomness in a fixed
    /// sequence. The top `elitism` members of each species are
    /// carried over unchanged; remaining slots are filled by
    /// tournament-selected parents, crossed over or cloned, and
    /// then mutated.
    pub(super) fn generate(
        &mut self,
        species: &mut [Species],
        allotments: &[usize],
        rng: &mut impl Rng,
    ) -> Vec<Genome> {
        let mut next_generation = Vec::with_capacity(allotments.iter().sum());

        for (current, &allotment) in species.iter_mut().zip(allotments) {
            current
                .members
                .sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
            let elites = allotment
                .min(self.population_config.elitism)
                .min(current.members.len());
            next_generation.extend_from_slice(&current.members[..elites]);

            for _ in elites..allotment {
                next_generation.push(self.breed(current, rng));
            }
        }

        next_generation
    }

    /// Produces one offspring of a species.
    fn breed(&mut self, species: &Species, rng: &mut impl Rng) -> Genome {
        let tournament_size = self.population_config.tournament_size;
        let first_parent = tournament(species, tournament_size, rng);

        let mut child = if species.members.len() > 1 {
            let second_parent = tournament(species, tournament_size, rng);
            if rng.gen_bool(self.population_config.crossover_rate) {
                Genome::crossover(first_parent, second_parent, rng)
            } else {
                first_parent.clone()
            }
        } else {
            first_parent.clone()
        };

        child.fitness = 0.0;
        child.adjusted_fitness = 0.0;
        child.species_id = Some(species.id());
        child.mutate(self.genetic_config, self.registry, rng);
        child
    }
}

/// Selects a parent by tournament: `size` members are sampled
/// uniformly without replacement, and the fittest of them wins.
fn tournament<'g>(species: &'g Species, size: usize, rng: &mut impl Rng) -> &'g Genome {
    species
        .members
        .choose_multiple(rng, size.min(species.members.len()))
        .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
        .unwrap_or_else(|| panic!("no eligible parents in species {}", species.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::populations::SpeciesId;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(23)
    }

    fn species_of(id: u64, fitnesses: &[f64]) -> Species {
        let members = fitnesses
            .iter()
            .map(|&fitness| {
                let mut genome = Genome::from_genes(
                    1,
                    1,
                    false,
                    vec![crate::genomics::ConnectionGene::new(1, 0, 1, 1.0)],
                );
                genome.fitness = fitness;
                genome.species_id = Some(SpeciesId(id));
                genome
            })
            .collect();
        Species {
            id: SpeciesId(id),
            members,
        }
    }

    #[test]
    fn sharing_divides_by_species_size() {
        let mut species = vec![species_of(0, &[10.0, 10.0]), species_of(1, &[9.0])];
        share_fitness(&mut species);
        for genome in species[0].members() {
            assert_eq!(genome.adjusted_fitness(), 5.0);
        }
        assert_eq!(species[1].members[0].adjusted_fitness(), 9.0);
    }

    #[test]
    fn allotment_follows_adjusted_fitness_sums() {
        // Sizes 10 and 2, all raw fitnesses 10: both species sum
        // to an adjusted 10 and split the population evenly.
        let mut species = vec![
            species_of(0, &[10.0; 10]),
            species_of(1, &[10.0; 2]),
        ];
        share_fitness(&mut species);
        assert_eq!(allot_offspring(&species, 12), vec![6, 6]);
    }

    #[test]
    fn allotment_total_is_exact() {
        let mut species = vec![
            species_of(0, &[3.0, 1.0, 2.0]),
            species_of(1, &[7.0]),
            species_of(2, &[0.5, 0.5]),
        ];
        share_fitness(&mut species);
        for target in [3, 7, 50, 151] {
            let allotments = allot_offspring(&species, target);
            assert_eq!(allotments.iter().sum::<usize>(), target);
        }
    }

    #[test]
    fn nonpositive_species_are_excluded() {
        let mut species = vec![
            species_of(0, &[10.0, 10.0]),
            species_of(1, &[f64::NEG_INFINITY, -1.0]),
        ];
        share_fitness(&mut species);
        let allotments = allot_offspring(&species, 8);
        assert_eq!(allotments, vec![8, 0]);
    }

    #[test]
    fn degenerate_fitness_falls_back_to_equal_split() {
        let mut species = vec![species_of(0, &[0.0, 0.0]), species_of(1, &[-2.0])];
        share_fitness(&mut species);
        let allotments = allot_offspring(&species, 8);
        assert_eq!(allotments.iter().sum::<usize>(), 8);
        // Both species keep a foothold in the equal split.
        assert!(allotments.iter().all(|&a| a > 0));
    }

    #[test]
    fn overcrowded_population_drops_weakest_species() {
        let mut species = vec![
            species_of(0, &[5.0]),
            species_of(1, &[1.0]),
            species_of(2, &[4.0]),
        ];
        share_fitness(&mut species);
        let allotments = allot_offspring(&species, 2);
        assert_eq!(allotments.iter().sum::<usize>(), 2);
        assert_eq!(allotments[1], 0);
    }

    /// Members spawned through the registry, so that later
    /// structural mutations stay innovation-consistent.
    fn bred_species(
        id: u64,
        fitnesses: &[f64],
        genetic_config: &GeneticConfig,
        registry: &mut InnovationRegistry,
        rng: &mut ChaCha8Rng,
    ) -> Species {
        let members = fitnesses
            .iter()
            .map(|&fitness| {
                let mut genome = Genome::minimal(genetic_config, registry, rng);
                genome.fitness = fitness;
                genome.species_id = Some(SpeciesId(id));
                genome
            })
            .collect();
        Species {
            id: SpeciesId(id),
            members,
        }
    }

    #[test]
    fn generation_size_matches_allotments() {
        let genetic_config = GeneticConfig::default();
        let population_config = PopulationConfig::default();
        let mut registry = InnovationRegistry::new(&genetic_config);
        let mut rng = rng();

        let mut species = vec![
            bred_species(0, &[3.0, 2.0, 1.0], &genetic_config, &mut registry, &mut rng),
            bred_species(1, &[5.0, 4.0], &genetic_config, &mut registry, &mut rng),
        ];
        share_fitness(&mut species);
        let allotments = allot_offspring(&species, 10);

        let mut factory = OffspringFactory::new(&genetic_config, &population_config, &mut registry);
        let next = factory.generate(&mut species, &allotments, &mut rng);
        assert_eq!(next.len(), 10);
        // Every offspring is stamped with its parent species.
        assert!(next.iter().all(|g| g.species_id().is_some()));
    }

    #[test]
    fn elites_are_carried_over_unchanged() {
        let genetic_config = GeneticConfig::default();
        let population_config = PopulationConfig::default();
        let mut registry = InnovationRegistry::new(&genetic_config);
        let mut rng = rng();

        let mut species = vec![bred_species(
            0,
            &[1.0, 9.0, 5.0],
            &genetic_config,
            &mut registry,
            &mut rng,
        )];
        share_fitness(&mut species);

        let mut factory = OffspringFactory::new(&genetic_config, &population_config, &mut registry);
        let next = factory.generate(&mut species, &[3], &mut rng);

        // The fittest member leads the new generation, fitness intact.
        assert_eq!(next[0].fitness(), 9.0);
    }
}
