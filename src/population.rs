use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::config::{Config, ConfigError, GenomeConfig};
use crate::fitness::FitnessFn;
use crate::gene::NodeKey;
use crate::genome::{Genome, GenomeError, GenomeKey};
use crate::innovation::InnovationArchive;
use crate::reproduction::Reproduction;
use crate::speciation::{SpeciationError, SpeciesSet};
use crate::stagnation;

#[derive(Debug, Error, PartialEq)]
pub enum PopulationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Genome(#[from] GenomeError),

    #[error(transparent)]
    Speciation(#[from] SpeciationError),

    #[error("genome {0} was not assigned a fitness")]
    MissingFitness(GenomeKey),

    #[error("genome {0} is already part of the population")]
    DuplicateGenome(GenomeKey),

    #[error("every species went extinct")]
    CompleteExtinction,
}

/// The genomes and species of an evolutionary run.
pub struct Population<R: Rng> {
    config: Config,

    /// The live genomes by their key.
    genomes: BTreeMap<GenomeKey, Genome>,

    species_set: SpeciesSet,

    generation: usize,

    /// The fittest genome of the last evaluated generation.
    best_genome: Option<Genome>,

    archive: InnovationArchive,

    reproduction: Reproduction,

    rng: R,
}

impl Population<ChaCha8Rng> {
    /// Creates a random population whose whole run is reproducible from `seed`.
    pub fn seeded(
        config: Config,
        seed: u64,
    ) -> Result<Population<ChaCha8Rng>, PopulationError> {
        Population::new(config, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> Population<R> {
    /// Creates a population of `population_size` genomes of the initial topology.
    pub fn new(config: Config, mut rng: R) -> Result<Population<R>, PopulationError> {
        config.validate()?;

        let mut reproduction = Reproduction::new(0);
        let genomes = reproduction.create_new(&config.genome, config.population_size, &mut rng);

        let mut population = Population {
            archive: InnovationArchive::new(first_free_node_key(&config.genome)),
            config,
            genomes,
            species_set: SpeciesSet::new(),
            generation: 0,
            best_genome: None,
            reproduction,
            rng,
        };
        population.assign_species();

        info!(
            "created population of {} genomes in {} species",
            population.genomes.len(),
            population.species_set.len()
        );
        Ok(population)
    }

    /// Creates a population of the given genomes instead of random ones.
    pub fn from_genomes(
        config: Config,
        genomes: Vec<Genome>,
        rng: R,
    ) -> Result<Population<R>, PopulationError> {
        config.validate()?;

        let mut population = Population {
            archive: InnovationArchive::new(first_free_node_key(&config.genome)),
            config,
            genomes: BTreeMap::new(),
            species_set: SpeciesSet::new(),
            generation: 0,
            best_genome: None,
            reproduction: Reproduction::new(0),
            rng,
        };
        population.inject_genomes(genomes)?;

        Ok(population)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn genomes(&self) -> &BTreeMap<GenomeKey, Genome> {
        &self.genomes
    }

    pub fn species(&self) -> &SpeciesSet {
        &self.species_set
    }

    pub fn species_count(&self) -> usize {
        self.species_set.len()
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// The evaluated genome of highest fitness, the lowest key winning ties.
    ///
    /// When no live genome carries a fitness, as after an `evolve` without elitism, this is the
    /// fittest genome of the last evaluated generation.
    pub fn get_best_genome(&self) -> Option<&Genome> {
        best_evaluated(self.genomes.values()).or_else(|| self.best_genome.as_ref())
    }

    /// Adds genomes to the live population and re-speciates it.
    ///
    /// Nothing is added when any of the genome keys is already taken.
    pub fn inject_genomes(&mut self, genomes: Vec<Genome>) -> Result<(), PopulationError> {
        let mut keys: BTreeSet<GenomeKey> = BTreeSet::new();
        for genome in genomes.iter() {
            if self.genomes.contains_key(&genome.key()) || !keys.insert(genome.key()) {
                return Err(PopulationError::DuplicateGenome(genome.key()));
            }
        }

        for genome in genomes.into_iter() {
            for &key in genome.nodes().keys() {
                self.archive.observe_node_key(key);
            }
            self.reproduction.observe_genome_key(genome.key());
            self.genomes.insert(genome.key(), genome);
        }

        self.assign_species();
        Ok(())
    }

    /// Runs a single generation.
    ///
    /// Evaluates every genome, speciates the population, removes stagnant species and replaces
    /// the population by the offspring of the remaining species. Fitness left over from the
    /// previous generation is cleared before evaluation.
    ///
    /// # Arguments
    ///
    /// * `fitness` - The function assigning a fitness to every genome.
    pub fn evolve<F: FitnessFn>(&mut self, mut fitness: F) -> Result<(), PopulationError> {
        {
            let mut genomes: Vec<&mut Genome> = self.genomes.values_mut().collect();
            for genome in genomes.iter_mut() {
                genome.fitness = None;
            }
            fitness.evaluate(&mut genomes);
        }

        if let Some(genome) = self.genomes.values().find(|g| g.fitness.is_none()) {
            return Err(PopulationError::MissingFitness(genome.key()));
        }
        self.best_genome = best_evaluated(self.genomes.values()).cloned();

        self.species_set
            .speciate(&self.genomes, &self.config.speciation, self.generation)?;

        if let Some(best) = self.best_genome.as_ref() {
            info!(
                "generation {}: {} species, best genome {} with fitness {:?}",
                self.generation,
                self.species_set.len(),
                best.key(),
                best.fitness
            );
        }

        let stagnant = stagnation::stagnant_species(
            &self.species_set,
            &self.config.stagnation,
            self.generation,
        );
        for key in stagnant {
            if let Some(species) = self.species_set.remove(key) {
                debug!(
                    "species {} removed, last improved in generation {}",
                    key,
                    species.last_improved()
                );
            }
        }

        if self.species_set.is_empty() {
            if !self.config.reset_on_extinction {
                return Err(PopulationError::CompleteExtinction);
            }

            warn!(
                "complete extinction in generation {}, creating a new population",
                self.generation
            );
            self.genomes = self.reproduction.create_new(
                &self.config.genome,
                self.config.population_size,
                &mut self.rng,
            );
        } else {
            self.genomes = self.reproduction.reproduce(
                &self.config,
                &mut self.species_set,
                &self.genomes,
                &mut self.archive,
                &mut self.rng,
            )?;
        }

        self.generation += 1;
        self.assign_species();

        Ok(())
    }

    fn assign_species(&mut self) {
        self.species_set
            .assign(&self.genomes, &self.config.speciation, self.generation);
    }
}

/// The genome of highest fitness, the first one winning ties.
fn best_evaluated<'a, I>(genomes: I) -> Option<&'a Genome>
where
    I: Iterator<Item = &'a Genome>,
{
    let mut best: Option<&Genome> = None;
    for genome in genomes {
        let fitness = match genome.fitness {
            Some(fitness) => fitness,
            None => continue,
        };
        if best.and_then(|b| b.fitness).map_or(true, |b| fitness > b) {
            best = Some(genome);
        }
    }
    best
}

/// The first node key free for hidden nodes created by mutation.
fn first_free_node_key(config: &GenomeConfig) -> NodeKey {
    (config.num_inputs + config.num_outputs + config.num_hidden) as NodeKey
}
