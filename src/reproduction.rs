use std::cmp::Ordering;
use std::collections::BTreeMap;

use log::debug;
use rand::Rng;

use crate::config::{Config, GenomeConfig};
use crate::genome::{Genome, GenomeError, GenomeKey};
use crate::innovation::InnovationArchive;
use crate::mutation;
use crate::speciation::{SpeciesKey, SpeciesSet};

/// Produces new generations of genomes, handing out population-unique genome keys.
#[derive(Clone, Debug)]
pub struct Reproduction {
    next_genome_key: GenomeKey,
}

impl Reproduction {
    pub fn new(first_genome_key: GenomeKey) -> Reproduction {
        Reproduction {
            next_genome_key: first_genome_key,
        }
    }

    /// Makes sure a genome key which entered the population from outside is never reused.
    pub fn observe_genome_key(&mut self, key: GenomeKey) {
        if key >= self.next_genome_key {
            self.next_genome_key = key + 1;
        }
    }

    fn next_key(&mut self) -> GenomeKey {
        let key = self.next_genome_key;
        self.next_genome_key += 1;
        key
    }

    /// Creates `count` genomes of the initial topology.
    pub fn create_new<R: Rng>(
        &mut self,
        config: &GenomeConfig,
        count: usize,
        rng: &mut R,
    ) -> BTreeMap<GenomeKey, Genome> {
        (0..count)
            .map(|_| {
                let key = self.next_key();
                (key, Genome::initial(key, config, rng))
            })
            .collect()
    }

    /// Produces the next generation from the evaluated and speciated genomes.
    ///
    /// Every species receives a share of `population_size` proportional to its adjusted
    /// fitness. Its fittest members are carried over unchanged and the remainder of its share
    /// is filled with mutated offspring of tournament-selected parents.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration governing reproduction and mutation.
    ///
    /// * `species_set` - The species of the current generation, their adjusted fitness is set.
    ///
    /// * `genomes` - The evaluated genomes of the current generation.
    ///
    /// * `archive` - The archive deduplicating hidden node innovations.
    pub fn reproduce<R: Rng>(
        &mut self,
        config: &Config,
        species_set: &mut SpeciesSet,
        genomes: &BTreeMap<GenomeKey, Genome>,
        archive: &mut InnovationArchive,
        rng: &mut R,
    ) -> Result<BTreeMap<GenomeKey, Genome>, GenomeError> {
        let reproduction_config = &config.reproduction;

        // The members of every species, fittest first.
        let mut members_by_species: BTreeMap<SpeciesKey, Vec<&Genome>> = BTreeMap::new();
        for species in species_set.species().values() {
            let mut members: Vec<&Genome> = species
                .members()
                .iter()
                .filter_map(|key| genomes.get(key))
                .collect();
            members.sort_by(|a, b| compare_fitness(b, a).then(a.key().cmp(&b.key())));
            members_by_species.insert(species.key(), members);
        }
        members_by_species.retain(|_, members| !members.is_empty());

        let mut adjusted: Vec<(SpeciesKey, f64)> = Vec::with_capacity(members_by_species.len());
        for (&key, members) in members_by_species.iter() {
            let sum: f64 = members.iter().filter_map(|g| g.fitness).sum();
            let mean = sum / members.len() as f64;
            let adjusted_fitness = if reproduction_config.fitness_sharing {
                mean / members.len() as f64
            } else {
                mean
            };
            if let Some(species) = species_set.get_mut(key) {
                species.adjusted_fitness = Some(adjusted_fitness);
            }
            adjusted.push((key, adjusted_fitness));
        }

        let quotas = allocate_offspring(&adjusted, config.population_size);

        let mut offspring: BTreeMap<GenomeKey, Genome> = BTreeMap::new();
        for (species_key, members) in members_by_species.iter() {
            let quota = quotas.get(species_key).cloned().unwrap_or(0);
            if quota == 0 {
                continue;
            }

            // The fittest members survive unchanged.
            let elites = reproduction_config.elitism.min(quota).min(members.len());
            for elite in members.iter().take(elites) {
                let key = self.next_key();
                offspring.insert(key, elite.clone_with_key(key));
            }

            let pool_size = ((reproduction_config.survival_threshold * members.len() as f64).ceil()
                as usize)
                .max(1)
                .min(members.len());
            let pool = &members[..pool_size];

            for _ in elites..quota {
                let key = self.next_key();

                let parent_1 = tournament(pool, reproduction_config.tournament_size, rng);
                let mut child = if rng.gen::<f64>() < reproduction_config.crossover_rate {
                    let parent_2 = tournament(pool, reproduction_config.tournament_size, rng);
                    Genome::crossover(key, parent_1, parent_2, rng)
                } else {
                    parent_1.clone_with_key(key)
                };
                child.fitness = None;

                mutation::mutate(&mut child, &config.genome, archive, rng)?;
                offspring.insert(key, child);
            }

            debug!(
                "species {}: {} offspring, {} elites from {} members",
                species_key,
                quota,
                elites,
                members.len()
            );
        }

        Ok(offspring)
    }
}

/// Orders genomes by fitness, unevaluated genomes being the least fit.
fn compare_fitness(a: &Genome, b: &Genome) -> Ordering {
    a.fitness.partial_cmp(&b.fitness).unwrap_or(Ordering::Equal)
}

/// Picks the fittest of `tournament_size` members drawn from the pool with replacement.
///
/// The pool must be ordered fittest first.
fn tournament<'a, R: Rng>(
    pool: &[&'a Genome],
    tournament_size: usize,
    rng: &mut R,
) -> &'a Genome {
    let winner = (0..tournament_size.max(1))
        .map(|_| rng.gen_range(0..pool.len()))
        .min()
        .unwrap_or(0);
    pool[winner]
}

/// Divides `population_size` offspring between species in proportion to adjusted fitness.
///
/// Negative fitness shifts every species up by the lowest value, and a total of zero divides
/// the population equally. Rounding shortfall goes to the fittest species while any excess is
/// taken from the least fit species first, so the quotas always sum to `population_size`.
pub fn allocate_offspring(
    adjusted: &[(SpeciesKey, f64)],
    population_size: usize,
) -> BTreeMap<SpeciesKey, usize> {
    let mut quotas: BTreeMap<SpeciesKey, usize> = BTreeMap::new();
    if adjusted.is_empty() {
        return quotas;
    }

    let min = adjusted.iter().map(|&(_, f)| f).fold(f64::INFINITY, f64::min);
    let shift = if min < 0.0 { -min } else { 0.0 };
    let total: f64 = adjusted.iter().map(|&(_, f)| f + shift).sum();

    for &(key, fitness) in adjusted.iter() {
        let share = if total > 0.0 {
            (fitness + shift) / total
        } else {
            1.0 / adjusted.len() as f64
        };
        quotas.insert(key, (share * population_size as f64).round() as usize);
    }

    // Fittest first, ties favouring the lower key.
    let mut order: Vec<(SpeciesKey, f64)> = adjusted.to_vec();
    order.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let allocated: usize = quotas.values().sum();
    if allocated < population_size {
        if let Some(quota) = quotas.get_mut(&order[0].0) {
            *quota += population_size - allocated;
        }
    } else {
        let mut excess = allocated - population_size;
        for &(key, _) in order.iter().rev() {
            if excess == 0 {
                break;
            }
            if let Some(quota) = quotas.get_mut(&key) {
                let cut = excess.min(*quota);
                *quota -= cut;
                excess -= cut;
            }
        }
    }

    quotas
}
