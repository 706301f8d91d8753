use log::trace;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::config::{AttributeConfig, GenomeConfig};
use crate::gene::{ConnectionGene, ConnectionKey, NodeGene, NodeKey, NodeKind};
use crate::genome::{Genome, GenomeError};
use crate::innovation::InnovationArchive;

/// Samples a fresh value from the attribute's initial distribution, clamped to its range.
pub fn init_value<R: Rng>(config: &AttributeConfig, rng: &mut R) -> f64 {
    let sample: f64 = rng.sample(StandardNormal);
    config.clamp(config.init_mean + config.init_stdev * sample)
}

/// Creates a node with freshly sampled parameters.
pub(crate) fn init_node<R: Rng>(
    key: NodeKey,
    kind: NodeKind,
    config: &GenomeConfig,
    rng: &mut R,
) -> NodeGene {
    let mut node = NodeGene::new(key, kind);
    node.bias = init_value(&config.bias, rng);
    node.response = init_value(&config.response, rng);
    node.activation_fn = config.activation;
    node.aggregation_fn = config.aggregation;
    node
}

/// Perturbs or replaces `value` according to the attribute's rates.
fn mutate_value<R: Rng>(value: f64, config: &AttributeConfig, rng: &mut R) -> f64 {
    let roll = rng.gen::<f64>();
    if roll < config.mutate_rate {
        let delta: f64 = rng.sample(StandardNormal);
        config.clamp(value + config.mutate_power * delta)
    } else if roll < config.mutate_rate + config.replace_rate {
        init_value(config, rng)
    } else {
        value
    }
}

/// Mutates the `Genome` in place.
///
/// Structural mutations are applied first, followed by the parametric mutations of every gene.
/// Neither the key nor the fitness of the `Genome` is touched.
///
/// # Arguments
///
/// * `genome` - The `Genome` to mutate.
///
/// * `config` - The configuration governing the mutation of the `Genome`.
///
/// * `archive` - The archive deduplicating hidden node innovations across the population.
pub fn mutate<R: Rng>(
    genome: &mut Genome,
    config: &GenomeConfig,
    archive: &mut InnovationArchive,
    rng: &mut R,
) -> Result<(), GenomeError> {
    if config.single_structural_mutation {
        let sum_prob = config.node_add_prob
            + config.node_delete_prob
            + config.conn_add_prob
            + config.conn_delete_prob;

        // If the sum of the probabilities is greater than 1, normalize the probability range
        // so the sum constitutes a 100% probability. Otherwise, allow the total probability
        // to be less than 1 to allow for a probability of no mutations.
        let prob = rng.gen_range(0.0..sum_prob.max(1.0));

        if prob < config.node_add_prob {
            mutate_add_node(genome, config, archive, rng)?;
        } else if prob < config.node_add_prob + config.node_delete_prob {
            mutate_delete_node(genome, rng);
        } else if prob < config.node_add_prob + config.node_delete_prob + config.conn_add_prob {
            mutate_add_connection(genome, config, rng)?;
        } else if prob < sum_prob {
            mutate_delete_connection(genome, rng);
        }
    } else {
        if rng.gen::<f64>() < config.node_add_prob {
            mutate_add_node(genome, config, archive, rng)?;
        }
        if rng.gen::<f64>() < config.node_delete_prob {
            mutate_delete_node(genome, rng);
        }
        if rng.gen::<f64>() < config.conn_add_prob {
            mutate_add_connection(genome, config, rng)?;
        }
        if rng.gen::<f64>() < config.conn_delete_prob {
            mutate_delete_connection(genome, rng);
        }
    }

    mutate_parameters(genome, config, rng);

    Ok(())
}

/// Mutates the `Genome` by splitting a random enabled connection with a new hidden node.
///
/// # Returns
///
/// Whether the structure of the `Genome` changed.
pub fn mutate_add_node<R: Rng>(
    genome: &mut Genome,
    config: &GenomeConfig,
    archive: &mut InnovationArchive,
    rng: &mut R,
) -> Result<bool, GenomeError> {
    let splittable: Vec<ConnectionKey> = genome.enabled_connections().map(|con| con.key).collect();

    let split = match splittable.choose(rng) {
        Some(&split) => split,
        None => {
            if config.structural_mutation_surer {
                return mutate_add_connection(genome, config, rng);
            }
            return Ok(false);
        }
    };

    // Disable the original connection.
    let weight = match genome.connection_mut(split) {
        Some(con) => {
            con.enabled = false;
            con.weight
        }
        None => return Ok(false),
    };

    let new_key = archive.record_hidden_node_innovation(split, |key| genome.node(key).is_some());

    let mut node = NodeGene::new(new_key, NodeKind::Hidden);
    node.activation_fn = config.activation;
    node.aggregation_fn = config.aggregation;
    genome.add_node(node)?;

    // The first connection is initialized with a weight of 1.
    // The second connection is initialized with the original connection's weight.
    // This preserves the original phenotype.
    genome.add_connection(ConnectionGene::new(split.input(), new_key, 1.0))?;
    genome.add_connection(ConnectionGene::new(new_key, split.output(), weight))?;

    trace!("genome {}: split {} with node {}", genome.key(), split, new_key);
    Ok(true)
}

/// Mutates the `Genome` by removing a random hidden node and every connection touching it.
pub fn mutate_delete_node<R: Rng>(genome: &mut Genome, rng: &mut R) -> bool {
    let hidden = genome.node_keys(NodeKind::Hidden);
    let key = match hidden.choose(rng) {
        Some(&key) => key,
        None => return false,
    };

    genome.remove_node(key);
    trace!("genome {}: deleted node {}", genome.key(), key);
    true
}

/// Mutates the `Genome` by adding a new `ConnectionGene` structural mutation.
///
/// Outputs never connect to outputs and, for feed forward genomes, candidates closing a cycle
/// are rejected. Under `structural_mutation_surer` an existing disabled connection is a candidate
/// as well and gets re-enabled when picked.
pub fn mutate_add_connection<R: Rng>(
    genome: &mut Genome,
    config: &GenomeConfig,
    rng: &mut R,
) -> Result<bool, GenomeError> {
    let possible_inputs: Vec<NodeKey> = genome.nodes().keys().cloned().collect();
    let possible_outputs: Vec<NodeKey> = genome
        .nodes()
        .values()
        .filter(|node| !node.kind.is_source())
        .map(|node| node.key)
        .collect();

    let mut possible_connections: Vec<ConnectionKey> = Vec::new();
    for &i in possible_inputs.iter() {
        let input_is_output = genome.node(i).map_or(false, |n| n.kind == NodeKind::Output);
        for &o in possible_outputs.iter() {
            if input_is_output && genome.node(o).map_or(false, |n| n.kind == NodeKind::Output) {
                continue;
            }

            let candidate = ConnectionKey(i, o);
            match genome.connection(candidate) {
                Some(con) if con.enabled || !config.structural_mutation_surer => continue,
                _ => (),
            }

            if config.feed_forward && genome.creates_cycle(candidate) {
                continue;
            }

            possible_connections.push(candidate);
        }
    }

    let candidate = match possible_connections.choose(rng) {
        Some(&candidate) => candidate,
        None => return Ok(false),
    };

    // Check if the connection already exists but is disabled.
    if let Some(existing) = genome.connection_mut(candidate) {
        existing.enabled = true;
        trace!("genome {}: re-enabled {}", genome.key(), candidate);
        return Ok(true);
    }

    let weight = init_value(&config.weight, rng);
    genome.add_connection(ConnectionGene::new(candidate.input(), candidate.output(), weight))?;

    trace!("genome {}: added {}", genome.key(), candidate);
    Ok(true)
}

/// Mutates the `Genome` by removing a random connection.
pub fn mutate_delete_connection<R: Rng>(genome: &mut Genome, rng: &mut R) -> bool {
    let keys: Vec<ConnectionKey> = genome.connections().keys().cloned().collect();
    let key = match keys.choose(rng) {
        Some(&key) => key,
        None => return false,
    };

    genome.remove_connection(key);
    trace!("genome {}: deleted {}", genome.key(), key);
    true
}

/// Applies the parametric mutations to every gene of the `Genome`.
pub fn mutate_parameters<R: Rng>(genome: &mut Genome, config: &GenomeConfig, rng: &mut R) {
    for con in genome.connections_mut() {
        if con.enabled {
            con.weight = mutate_value(con.weight, &config.weight, rng);
        }
    }

    for node in genome.nodes_mut() {
        if node.kind.is_source() {
            continue;
        }

        node.bias = mutate_value(node.bias, &config.bias, rng);
        node.response = mutate_value(node.response, &config.response, rng);

        if rng.gen::<f64>() < config.activation_mutate_rate {
            if let Some(&activation_fn) = config.activation_options.choose(rng) {
                node.activation_fn = activation_fn;
            }
        }
    }

    for con in genome.connections_mut() {
        if rng.gen::<f64>() < config.enabled_mutate_rate {
            con.enabled = !con.enabled;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::activation::ActivationFn;
    use crate::network::{FeedForwardNetwork, NetworkError};

    fn config(num_inputs: usize, num_outputs: usize) -> GenomeConfig {
        let mut config = GenomeConfig::new(num_inputs, num_outputs);
        config.disable_mutation();
        config
    }

    fn enabled_count(genome: &Genome) -> usize {
        genome.enabled_connections().count()
    }

    #[test]
    fn test_init_value_clamped() {
        let mut attribute = AttributeConfig::default();
        attribute.init_mean = 100.0;
        attribute.init_stdev = 0.0;
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        assert_eq!(init_value(&attribute, &mut rng), attribute.max_value);
    }

    #[test]
    fn test_mutate_add_node() {
        let genome_config = config(1, 1);
        let mut archive = InnovationArchive::new(2);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);
        let weight = genome.connection(ConnectionKey(0, 1)).unwrap().weight;

        assert_eq!(genome.nodes().len(), 2);
        assert_eq!(genome.connections().len(), 1);
        assert_eq!(enabled_count(&genome), 1);

        assert_eq!(
            mutate_add_node(&mut genome, &genome_config, &mut archive, &mut rng),
            Ok(true)
        );

        assert_eq!(genome.nodes().len(), 3);
        assert_eq!(genome.connections().len(), 3);
        assert_eq!(enabled_count(&genome), 2);

        assert!(!genome.connection(ConnectionKey(0, 1)).unwrap().enabled);
        assert_eq!(genome.node(2).unwrap().kind, NodeKind::Hidden);
        assert_eq!(genome.connection(ConnectionKey(0, 2)).unwrap().weight, 1.0);
        assert_eq!(genome.connection(ConnectionKey(2, 1)).unwrap().weight, weight);
    }

    #[test]
    fn test_mutate_add_node_shares_innovation() {
        let genome_config = config(1, 1);
        let mut archive = InnovationArchive::new(2);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome_1 = Genome::initial(0, &genome_config, &mut rng);
        let mut genome_2 = Genome::initial(1, &genome_config, &mut rng);

        mutate_add_node(&mut genome_1, &genome_config, &mut archive, &mut rng).unwrap();
        mutate_add_node(&mut genome_2, &genome_config, &mut archive, &mut rng).unwrap();

        assert_eq!(
            genome_1.connections().keys().collect::<Vec<_>>(),
            genome_2.connections().keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_mutate_add_node_no_free_connection() {
        let mut genome_config = config(1, 1);
        genome_config.set_start_connected(false);
        let mut archive = InnovationArchive::new(2);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);

        assert_eq!(
            mutate_add_node(&mut genome, &genome_config, &mut archive, &mut rng),
            Ok(false)
        );
        assert_eq!(genome.nodes().len(), 2);
        assert_eq!(genome.connections().len(), 0);
    }

    #[test]
    fn test_mutate_add_node_surer_falls_back() {
        let mut genome_config = config(1, 1);
        genome_config
            .set_start_connected(false)
            .set_structural_mutation_surer(true);
        let mut archive = InnovationArchive::new(2);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);

        assert_eq!(
            mutate_add_node(&mut genome, &genome_config, &mut archive, &mut rng),
            Ok(true)
        );
        assert_eq!(genome.nodes().len(), 2);
        assert!(genome.connection(ConnectionKey(0, 1)).is_some());
    }

    #[test]
    fn test_mutate_add_connection_new() {
        let mut genome_config = config(1, 1);
        genome_config.set_start_connected(false);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);

        assert_eq!(
            mutate_add_connection(&mut genome, &genome_config, &mut rng),
            Ok(true)
        );
        assert_eq!(genome.connections().len(), 1);
        assert!(genome.connection(ConnectionKey(0, 1)).unwrap().enabled);
    }

    #[test]
    fn test_mutate_add_connection_no_free_connection() {
        let genome_config = config(1, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);

        // The only legal connection already exists.
        assert_eq!(
            mutate_add_connection(&mut genome, &genome_config, &mut rng),
            Ok(false)
        );
        assert_eq!(genome.connections().len(), 1);
    }

    #[test]
    fn test_mutate_add_connection_reenable() {
        let mut genome_config = config(1, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);
        genome.connection_mut(ConnectionKey(0, 1)).unwrap().enabled = false;

        // Without the surer policy disabled connections are left alone.
        assert_eq!(
            mutate_add_connection(&mut genome, &genome_config, &mut rng),
            Ok(false)
        );

        genome_config.set_structural_mutation_surer(true);

        assert_eq!(
            mutate_add_connection(&mut genome, &genome_config, &mut rng),
            Ok(true)
        );
        assert_eq!(genome.connections().len(), 1);
        assert!(genome.connection(ConnectionKey(0, 1)).unwrap().enabled);
    }

    #[test]
    fn test_mutate_add_connection_never_cycles() {
        let genome_config = config(2, 2);
        let mut archive = InnovationArchive::new(4);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);
        for _ in 0..5 {
            mutate_add_node(&mut genome, &genome_config, &mut archive, &mut rng).unwrap();
        }
        while mutate_add_connection(&mut genome, &genome_config, &mut rng).unwrap() {}

        for key in genome.connections().keys() {
            assert_ne!(key.input(), key.output());

            let is_output = |k| genome.node(k).unwrap().kind == NodeKind::Output;
            assert!(!(is_output(key.input()) && is_output(key.output())));
            assert!(!genome.node(key.output()).unwrap().kind.is_source());
        }

        // Every remaining pair in the reverse direction would close a cycle.
        for key in genome.connections().keys() {
            assert!(genome.creates_cycle(ConnectionKey(key.output(), key.input())));
        }
    }

    #[test]
    fn test_mutate_add_connection_recurrent() {
        let mut genome_config = config(1, 1);
        let mut archive = InnovationArchive::new(2);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);
        assert_eq!(
            mutate_add_node(&mut genome, &genome_config, &mut archive, &mut rng),
            Ok(true)
        );

        // Both free pairs, 1 -> 2 and 2 -> 2, close a cycle.
        assert_eq!(
            mutate_add_connection(&mut genome, &genome_config, &mut rng),
            Ok(false)
        );

        genome_config.set_feed_forward(false);
        while mutate_add_connection(&mut genome, &genome_config, &mut rng).unwrap() {}

        assert!(genome.connection(ConnectionKey(1, 2)).unwrap().enabled);
        assert!(genome.connection(ConnectionKey(2, 2)).unwrap().enabled);
        assert_eq!(
            FeedForwardNetwork::create(&genome).unwrap_err(),
            NetworkError::Cycle
        );
    }

    #[test]
    fn test_mutate_delete_node() {
        let genome_config = config(1, 1);
        let mut archive = InnovationArchive::new(2);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);

        // Inputs and outputs are never deleted.
        assert!(!mutate_delete_node(&mut genome, &mut rng));
        assert_eq!(genome.nodes().len(), 2);

        mutate_add_node(&mut genome, &genome_config, &mut archive, &mut rng).unwrap();

        assert!(mutate_delete_node(&mut genome, &mut rng));
        assert_eq!(genome.nodes().len(), 2);
        assert_eq!(
            genome.connections().keys().cloned().collect::<Vec<_>>(),
            vec![ConnectionKey(0, 1)]
        );
    }

    #[test]
    fn test_mutate_delete_connection() {
        let genome_config = config(2, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);

        assert!(mutate_delete_connection(&mut genome, &mut rng));
        assert_eq!(genome.connections().len(), 1);
        assert!(mutate_delete_connection(&mut genome, &mut rng));
        assert!(!mutate_delete_connection(&mut genome, &mut rng));
        assert_eq!(genome.nodes().len(), 3);
    }

    #[test]
    fn test_mutate_disabled_changes_nothing() {
        let genome_config = config(3, 2);
        let mut archive = InnovationArchive::new(5);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);
        genome.fitness = Some(1.5);
        let original = genome.clone();

        mutate(&mut genome, &genome_config, &mut archive, &mut rng).unwrap();

        assert_eq!(genome, original);
    }

    #[test]
    fn test_mutate_weights_clamped() {
        let mut genome_config = config(2, 1);
        genome_config
            .set_weight_mutate_rate(1.0)
            .set_weight_mutate_power(100.0);
        genome_config.weight.init_stdev = 0.0;
        genome_config.weight.min_value = -1.0;
        genome_config.weight.max_value = 1.0;
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);
        assert!(genome.connections().values().all(|c| c.weight == 0.0));

        mutate_parameters(&mut genome, &genome_config, &mut rng);

        let after: Vec<f64> = genome.connections().values().map(|c| c.weight).collect();
        assert!(after.iter().all(|w| *w != 0.0));
        assert!(after.iter().all(|w| *w >= -1.0 && *w <= 1.0));
    }

    #[test]
    fn test_mutate_weights_skip_disabled() {
        let mut genome_config = config(1, 1);
        genome_config.set_weight_mutate_rate(1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);
        genome.connection_mut(ConnectionKey(0, 1)).unwrap().enabled = false;
        let before = genome.connection(ConnectionKey(0, 1)).unwrap().weight;

        mutate_parameters(&mut genome, &genome_config, &mut rng);

        assert_eq!(genome.connection(ConnectionKey(0, 1)).unwrap().weight, before);
    }

    #[test]
    fn test_mutate_activation() {
        let mut genome_config = config(1, 1);
        genome_config.activation_mutate_rate = 1.0;
        genome_config.activation_options = vec![ActivationFn::Tanh];
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);

        mutate_parameters(&mut genome, &genome_config, &mut rng);

        assert_eq!(genome.node(1).unwrap().activation_fn, ActivationFn::Tanh);
        // Inputs hold no parameters worth mutating.
        assert_eq!(genome.node(0).unwrap().activation_fn, ActivationFn::Sigmoid);
    }

    #[test]
    fn test_mutate_toggle_enabled() {
        let mut genome_config = config(2, 1);
        genome_config.set_enabled_mutate_rate(1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut genome = Genome::initial(0, &genome_config, &mut rng);

        mutate_parameters(&mut genome, &genome_config, &mut rng);
        assert_eq!(enabled_count(&genome), 0);

        mutate_parameters(&mut genome, &genome_config, &mut rng);
        assert_eq!(enabled_count(&genome), 2);
    }

    #[test]
    fn test_mutate_single_structural() {
        let mut genome_config = config(2, 1);
        genome_config.single_structural_mutation = true;
        genome_config.set_node_add_prob(1.0).set_conn_delete_prob(1.0);
        let mut archive = InnovationArchive::new(3);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        for _ in 0..10 {
            let mut genome = Genome::initial(0, &genome_config, &mut rng);

            mutate(&mut genome, &genome_config, &mut archive, &mut rng).unwrap();

            // Either one node was added or one connection deleted, never both.
            let added_node = genome.nodes().len() == 4 && genome.connections().len() == 4;
            let deleted = genome.nodes().len() == 3 && genome.connections().len() == 1;
            assert!(added_node || deleted);
        }
    }
}
