use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use thiserror::Error;

use crate::config::SpeciationConfig;
use crate::genome::{Genome, GenomeKey};

pub type SpeciesKey = u32;

#[derive(Debug, Error, PartialEq)]
pub enum SpeciationError {
    #[error("genome {0} has not been evaluated")]
    MissingFitness(GenomeKey),
}

/// A cluster of genomes judged mutually compatible.
#[derive(Clone, Debug)]
pub struct Species {
    key: SpeciesKey,

    /// The generation the species was created in.
    created: usize,

    /// The last generation the mean fitness of the species exceeded every earlier mean.
    pub(crate) last_improved: usize,

    /// A snapshot of the genome new members are compared against.
    representative: Genome,

    /// The keys of the member genomes, ascending.
    members: Vec<GenomeKey>,

    /// The mean fitness of the members, once evaluated.
    pub(crate) fitness: Option<f64>,

    /// The fitness used to allocate offspring, set during reproduction.
    pub(crate) adjusted_fitness: Option<f64>,

    fitness_history: Vec<f64>,
}

impl Species {
    fn new(key: SpeciesKey, generation: usize, representative: &Genome) -> Species {
        Species {
            key,
            created: generation,
            last_improved: generation,
            representative: representative.clone(),
            members: vec![representative.key()],
            fitness: None,
            adjusted_fitness: None,
            fitness_history: Vec::new(),
        }
    }

    pub fn key(&self) -> SpeciesKey {
        self.key
    }

    pub fn created(&self) -> usize {
        self.created
    }

    pub fn last_improved(&self) -> usize {
        self.last_improved
    }

    pub fn age(&self, generation: usize) -> usize {
        generation.saturating_sub(self.created)
    }

    pub fn representative(&self) -> &Genome {
        &self.representative
    }

    pub fn members(&self) -> &[GenomeKey] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn adjusted_fitness(&self) -> Option<f64> {
        self.adjusted_fitness
    }

    pub fn fitness_history(&self) -> &[f64] {
        &self.fitness_history
    }

    /// Records the mean fitness of the members as the latest fitness of the species.
    fn update_fitness(
        &mut self,
        genomes: &BTreeMap<GenomeKey, Genome>,
        generation: usize,
    ) -> Result<(), SpeciationError> {
        let mut sum = 0.0;
        for key in self.members.iter() {
            match genomes.get(key).and_then(|genome| genome.fitness) {
                Some(fitness) => sum += fitness,
                None => return Err(SpeciationError::MissingFitness(*key)),
            }
        }
        let mean = sum / self.members.len().max(1) as f64;

        if self.fitness_history.iter().all(|&previous| mean > previous) {
            self.last_improved = generation;
        }
        self.fitness = Some(mean);
        self.fitness_history.push(mean);
        Ok(())
    }
}

/// The species of a population, kept across generations.
#[derive(Clone, Debug, Default)]
pub struct SpeciesSet {
    species: BTreeMap<SpeciesKey, Species>,
    next_key: SpeciesKey,
}

impl SpeciesSet {
    pub fn new() -> SpeciesSet {
        SpeciesSet::default()
    }

    pub fn species(&self) -> &BTreeMap<SpeciesKey, Species> {
        &self.species
    }

    pub fn get(&self, key: SpeciesKey) -> Option<&Species> {
        self.species.get(&key)
    }

    pub(crate) fn get_mut(&mut self, key: SpeciesKey) -> Option<&mut Species> {
        self.species.get_mut(&key)
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn remove(&mut self, key: SpeciesKey) -> Option<Species> {
        self.species.remove(&key)
    }

    /// The species the genome belongs to, if any.
    pub fn species_of(&self, genome_key: GenomeKey) -> Option<SpeciesKey> {
        self.species
            .values()
            .find(|s| s.members.binary_search(&genome_key).is_ok())
            .map(|s| s.key)
    }

    /// Clusters the genomes into species.
    ///
    /// Every existing species first adopts the genome closest to its previous representative
    /// as its new representative. Only genomes closer than the compatibility threshold are
    /// considered, so a species whose lineage died out adopts nothing rather than an unrelated
    /// genome. Each remaining genome, in ascending key order, then joins the first species (in
    /// ascending key order) whose representative is closer than the compatibility threshold,
    /// or founds a new species. Species left without
    /// members are removed.
    ///
    /// # Arguments
    ///
    /// * `genomes` - Every genome of the population.
    ///
    /// * `config` - The configuration governing compatibility.
    ///
    /// * `generation` - The current generation, recorded on new species.
    pub fn assign(
        &mut self,
        genomes: &BTreeMap<GenomeKey, Genome>,
        config: &SpeciationConfig,
        generation: usize,
    ) {
        let mut unspeciated: BTreeSet<GenomeKey> = genomes.keys().cloned().collect();

        for species in self.species.values_mut() {
            species.members.clear();

            let mut closest: Option<(GenomeKey, f64)> = None;
            for key in unspeciated.iter() {
                let distance = genomes[key].distance(&species.representative, config);
                if distance >= config.compatibility_threshold {
                    continue;
                }
                // Ties keep the lower key since keys are visited in ascending order.
                if closest.map_or(true, |(_, best)| distance < best) {
                    closest = Some((*key, distance));
                }
            }

            if let Some((key, _)) = closest {
                unspeciated.remove(&key);
                species.representative = genomes[&key].clone();
                species.members.push(key);
            }
        }

        for key in unspeciated.into_iter() {
            let genome = &genomes[&key];

            let compatible = self.species.values_mut().find(|species| {
                genome.distance(&species.representative, config) < config.compatibility_threshold
            });

            match compatible {
                Some(species) => species.members.push(key),
                None => {
                    let species_key = self.next_key;
                    self.next_key += 1;

                    debug!("genome {} founded species {}", key, species_key);
                    self.species
                        .insert(species_key, Species::new(species_key, generation, genome));
                }
            }
        }

        self.species.retain(|_, species| !species.members.is_empty());
        for species in self.species.values_mut() {
            species.members.sort();
        }

        debug!(
            "generation {}: {} genomes in {} species",
            generation,
            genomes.len(),
            self.species.len()
        );
    }

    /// Clusters the genomes into species and updates the fitness of every species.
    ///
    /// Fails, leaving the species untouched, when any genome hasn't been evaluated.
    pub fn speciate(
        &mut self,
        genomes: &BTreeMap<GenomeKey, Genome>,
        config: &SpeciationConfig,
        generation: usize,
    ) -> Result<(), SpeciationError> {
        if let Some(genome) = genomes.values().find(|genome| genome.fitness.is_none()) {
            return Err(SpeciationError::MissingFitness(genome.key()));
        }

        self.assign(genomes, config, generation);

        for species in self.species.values_mut() {
            species.update_fitness(genomes, generation)?;
            debug!(
                "species {}: {} members, fitness {:?}, age {}",
                species.key,
                species.members.len(),
                species.fitness,
                species.age(generation)
            );
        }

        Ok(())
    }
}
