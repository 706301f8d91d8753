use std::cmp::Ordering;

use crate::config::StagnationConfig;
use crate::speciation::{SpeciesKey, SpeciesSet};

/// Finds the species which haven't improved for `stagnation_limit` generations.
///
/// The `species_elitism` fittest species are never stagnant, and a limit of `0` disables
/// stagnation entirely.
///
/// # Returns
///
/// The keys of the stagnant species, ascending.
pub fn stagnant_species(
    species_set: &SpeciesSet,
    config: &StagnationConfig,
    generation: usize,
) -> Vec<SpeciesKey> {
    if config.stagnation_limit == 0 {
        return Vec::new();
    }

    // Fittest first, unevaluated species last.
    let mut by_fitness: Vec<(SpeciesKey, Option<f64>)> = species_set
        .species()
        .values()
        .map(|species| (species.key(), species.fitness()))
        .collect();
    by_fitness.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let mut stagnant: Vec<SpeciesKey> = by_fitness
        .iter()
        .skip(config.species_elitism)
        .filter_map(|&(key, _)| species_set.get(key))
        .filter(|species| {
            generation.saturating_sub(species.last_improved()) >= config.stagnation_limit
        })
        .map(|species| species.key())
        .collect();
    stagnant.sort();
    stagnant
}
