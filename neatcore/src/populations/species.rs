use crate::genomics::{GeneticConfig, Genome};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use std::collections::BTreeMap;
use std::fmt;

/// Species identifier. Ids are handed out in increasing order
/// over the lifetime of a run and are never reused, even after
/// the species goes extinct.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SpeciesId(pub u64);

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// One generation's membership of a species.
///
/// Species persist across generations through their
/// representative, held by [`Speciation`]; the member list is
/// rebuilt every generation.
#[derive(Clone, Debug)]
pub struct Species {
    pub(super) id: SpeciesId,
    pub(super) members: Vec<Genome>,
}

impl Species {
    /// Returns the species' id.
    pub fn id(&self) -> SpeciesId {
        self.id
    }

    /// Returns an iterator over the species' current members.
    pub fn members(&self) -> impl Iterator<Item = &Genome> {
        self.members.iter()
    }

    /// Returns the number of current members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns whether the species has no members this generation.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Partitions each generation's genomes into species by
/// compatibility distance against persistent representatives.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Speciation {
    representatives: BTreeMap<SpeciesId, Genome>,
    next_species_id: u64,
}

impl Speciation {
    /// Creates an empty registry; the first speciated generation
    /// founds its own species.
    pub fn new() -> Speciation {
        Speciation::default()
    }

    /// Assigns every genome to a species and refreshes the
    /// representatives for the next generation.
    ///
    /// Assignment is first-match: representatives are tested in
    /// ascending species id order and the first within
    /// `threshold` wins, which keeps runs reproducible under a
    /// fixed seed. A genome matching no representative founds a
    /// new species with itself as representative; later genomes
    /// of the same generation can then join it. After assignment
    /// each surviving species' representative is replaced by a
    /// uniformly random member, and species left without members
    /// are dropped.
    ///
    /// Returns the species in ascending id order.
    pub fn speciate(
        &mut self,
        genomes: Vec<Genome>,
        threshold: f64,
        config: &GeneticConfig,
        rng: &mut impl Rng,
    ) -> Vec<Species> {
        let mut members: BTreeMap<SpeciesId, Vec<Genome>> = BTreeMap::new();

        for mut genome in genomes {
            let assigned = self
                .representatives
                .iter()
                .find(|(_, representative)| {
                    Genome::compatibility_distance(&genome, representative, config) < threshold
                })
                .map(|(&id, _)| id);

            let id = match assigned {
                Some(id) => id,
                None => {
                    let id = SpeciesId(self.next_species_id);
                    self.next_species_id += 1;
                    self.representatives.insert(id, genome.clone());
                    debug!(species = %id, "founded new species");
                    id
                }
            };
            genome.species_id = Some(id);
            members.entry(id).or_default().push(genome);
        }

        // Representatives of species that attracted no genome this
        // generation are dropped; survivors are re-drawn from the
        // new membership.
        self.representatives
            .retain(|id, _| members.contains_key(id));
        for (id, group) in &members {
            let pick = rng.gen_range(0..group.len());
            self.representatives.insert(*id, group[pick].clone());
        }

        members
            .into_iter()
            .map(|(id, group)| Species { id, members: group })
            .collect()
    }

    /// Returns the representatives the next generation will be
    /// tested against, in ascending species id order.
    pub fn representatives(&self) -> impl Iterator<Item = (SpeciesId, &Genome)> {
        self.representatives.iter().map(|(&id, genome)| (id, genome))
    }

    /// Returns the number of live species.
    pub fn species_count(&self) -> usize {
        self.representatives.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{ConnectionGene, InnovationRegistry};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(11)
    }

    fn far_genome(weight: f64) -> Genome {
        // Single-gene genomes whose distance is 0.4 x weight difference.
        Genome::from_genes(1, 1, false, vec![ConnectionGene::new(1, 0, 1, weight)])
    }

    #[test]
    fn identical_genomes_share_one_species() {
        let config = GeneticConfig::default();
        let mut registry = InnovationRegistry::new(&config);
        let mut rng = rng();
        let founder = Genome::minimal(&config, &mut registry, &mut rng);
        let population = vec![founder; 5];

        let mut speciation = Speciation::new();
        let species = speciation.speciate(population, 3.0, &config, &mut rng);

        assert_eq!(species.len(), 1);
        assert_eq!(species[0].id(), SpeciesId(0));
        assert_eq!(species[0].len(), 5);
    }

    #[test]
    fn distant_genomes_found_new_species() {
        let config = GeneticConfig::default();
        let mut rng = rng();
        // Weight gap of 100 gives a distance of 40, far over threshold.
        let population = vec![far_genome(0.0), far_genome(100.0), far_genome(0.5)];

        let mut speciation = Speciation::new();
        let species = speciation.speciate(population, 3.0, &config, &mut rng);

        assert_eq!(species.len(), 2);
        assert_eq!(species[0].id(), SpeciesId(0));
        assert_eq!(species[1].id(), SpeciesId(1));
        // The third genome re-joins the first species (distance 0.2).
        assert_eq!(species[0].len(), 2);
    }

    #[test]
    fn every_member_is_stamped_with_a_live_species() {
        let config = GeneticConfig::default();
        let mut rng = rng();
        let population = vec![far_genome(0.0), far_genome(100.0), far_genome(-100.0)];

        let mut speciation = Speciation::new();
        let species = speciation.speciate(population, 3.0, &config, &mut rng);

        let live: Vec<SpeciesId> = speciation.representatives().map(|(id, _)| id).collect();
        for s in &species {
            for member in s.members() {
                assert_eq!(member.species_id(), Some(s.id()));
                assert!(live.contains(&s.id()));
            }
        }
    }

    #[test]
    fn ids_are_never_reused() {
        let config = GeneticConfig::default();
        let mut rng = rng();
        let mut speciation = Speciation::new();

        speciation.speciate(vec![far_genome(0.0)], 3.0, &config, &mut rng);
        // The founding species dies out: nothing is compatible.
        speciation.speciate(vec![far_genome(100.0)], 3.0, &config, &mut rng);
        let species = speciation.speciate(vec![far_genome(200.0)], 3.0, &config, &mut rng);

        assert_eq!(species[0].id(), SpeciesId(2));
        assert_eq!(speciation.species_count(), 1);
    }
}
